use crate::duration::parse_duration;
use crate::ingestion::TimeEntry;
use crate::schema::BillingConfig;
use crate::Warning;
use chrono::NaiveDate;
use log::warn;
use std::collections::BTreeSet;

/// A normalized time entry. `client` is None when the raw category has no
/// entry in the category map; such rows stay in the accounting extract and
/// the detail log but never enter per-client billing totals.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanEntry {
    pub person: String,
    pub date: NaiveDate,
    pub hours: f64,
    pub client: Option<String>,
    pub raw_category: String,
    pub task: String,
    pub task_id: String,
}

/// Row-level normalization result. Bad rows are values, not exceptions, so
/// aggregation can fold over a uniform sequence and collect warnings.
#[derive(Debug, Clone)]
pub enum RowOutcome {
    Clean(CleanEntry),
    Unmapped(CleanEntry),
    ParseFailure { entry: TimeEntry, reason: String },
}

/// Normalizes one raw entry: duration string to decimal hours, raw category
/// tag to canonical client name. The category lookup is exact-match and
/// case-sensitive.
pub fn normalize_entry(entry: &TimeEntry, config: &BillingConfig) -> RowOutcome {
    let hours = match parse_duration(&entry.raw_duration) {
        Ok(hours) => hours,
        Err(failure) => {
            return RowOutcome::ParseFailure {
                entry: entry.clone(),
                reason: failure.to_string(),
            }
        }
    };

    let client = config.category_map.get(&entry.raw_category).cloned();

    let clean = CleanEntry {
        person: entry.person.clone(),
        date: entry.date,
        hours,
        client: client.clone(),
        raw_category: entry.raw_category.clone(),
        task: entry.task.clone(),
        task_id: entry.task_id.clone(),
    };

    if client.is_some() {
        RowOutcome::Clean(clean)
    } else {
        RowOutcome::Unmapped(clean)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Mapped and unmapped entries, in input order. Parse failures are not
    /// represented here; they only surface as warnings.
    pub entries: Vec<CleanEntry>,
    pub warnings: Vec<Warning>,
}

/// Normalizes a batch of raw entries, accumulating warnings instead of
/// failing the run. Unmapped categories are reported once, as a set, so the
/// operator can extend the mapping before the next run.
pub fn normalize_entries(entries: &[TimeEntry], config: &BillingConfig) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut unmapped_categories: BTreeSet<String> = BTreeSet::new();

    for entry in entries {
        match normalize_entry(entry, config) {
            RowOutcome::Clean(clean) => batch.entries.push(clean),
            RowOutcome::Unmapped(clean) => {
                unmapped_categories.insert(clean.raw_category.clone());
                batch.entries.push(clean);
            }
            RowOutcome::ParseFailure { entry, reason } => {
                warn!(
                    "Excluding row from totals: {} ({} on {})",
                    reason, entry.person, entry.date
                );
                batch.warnings.push(Warning::ParseFailure {
                    person: entry.person,
                    date: entry.date,
                    task: entry.task,
                    raw_duration: entry.raw_duration,
                });
            }
        }
    }

    if !unmapped_categories.is_empty() {
        warn!(
            "Unmapped categories excluded from client billing: {:?}",
            unmapped_categories
        );
        batch.warnings.push(Warning::UnmappedCategories {
            categories: unmapped_categories.into_iter().collect(),
        });
    }

    batch
}
