//! # Timebill
//!
//! A library for reconciling monthly time-tracking exports against client
//! budgets and producing accounting-ready billing artifacts.
//!
//! ## Core Concepts
//!
//! - **Time Entry**: One raw export row (person, date, duration text, category tag, task)
//! - **Normalization**: Duration strings become decimal hours; category tags resolve to
//!   canonical client names through an exact-match mapping
//! - **Billing**: Per-client hours joined with contracted hourly rates; rounding happens
//!   only at the report boundary
//! - **Budget Tracking**: Remaining budget is carried between runs as external state; a
//!   run reads the old state and proposes a new one, with burn-rate projection and alerts
//! - **Artifacts**: An accounting CSV and a Markdown summary, written atomically
//!
//! ## Example
//!
//! ```rust,ignore
//! use timebill::*;
//!
//! let mut config = BillingConfig::default();
//! config.category_map.insert("BILLABLE - JN".into(), "Job News".into());
//! config.billing_rates.insert("Job News".into(), 175.0);
//! config.remaining_budget.insert("Job News".into(), 200.0);
//!
//! let run = process_export_file(&config, "raw/time_tracking/export.csv")?;
//! let artifacts = report::assemble(&run, &config)?;
//! report::write_artifacts(&artifacts, "output/cleaned".as_ref(), "output/reports".as_ref())?;
//!
//! // The proposed budget state is persisted by the operator, not the run.
//! println!("{}", serde_json::to_string_pretty(&run.new_budget)?);
//! ```

pub mod archive;
pub mod budget;
pub mod calculator;
pub mod duration;
pub mod error;
pub mod ingestion;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod utils;

pub use archive::{archive_period, ArchiveLayout, ArchiveReport};
pub use budget::{track_budgets, AlertState, BudgetState, ClientPeriodSummary, TrackerOutput};
pub use calculator::{
    bill_clients, monthly_breakdown, summarize_people, ClientBilling, MonthlyBreakdownRow,
    PersonSummary,
};
pub use duration::{parse_duration, DurationParseError};
pub use error::{BillingError, Result};
pub use ingestion::{read_export, TimeEntry};
pub use normalize::{normalize_entries, normalize_entry, CleanEntry, NormalizedBatch, RowOutcome};
pub use report::{assemble, write_artifacts, RunArtifacts};
pub use schema::*;
pub use utils::BillingPeriod;

use chrono::NaiveDate;
use log::{debug, info};
use std::fmt;
use std::path::Path;

/// A degraded-data condition that was survived, not fatal. Every warning
/// reaches the summary report's warnings section; none is dropped silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A row whose duration could not be parsed; excluded from all totals.
    ParseFailure {
        person: String,
        date: NaiveDate,
        task: String,
        raw_duration: String,
    },
    /// Category tags with no entry in the mapping; their rows carry no
    /// client and are excluded from per-client billing.
    UnmappedCategories { categories: Vec<String> },
    /// A client with billable hours but no configured rate.
    MissingRate { client: String, hours: f64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ParseFailure {
                person,
                date,
                task,
                raw_duration,
            } => write!(
                f,
                "Unparseable duration '{}' for {} on {} ({}); row excluded from totals",
                raw_duration, person, date, task
            ),
            Warning::UnmappedCategories { categories } => write!(
                f,
                "Unmapped categories: {{{}}}; matching rows excluded from client billing",
                categories.join(", ")
            ),
            Warning::MissingRate { client, hours } => write!(
                f,
                "No billing rate configured for client '{}' ({:.2} hours); amount not computed",
                client, hours
            ),
        }
    }
}

/// Everything one run computed: normalized entries, per-client and
/// per-person summaries, the proposed budget state, and the warnings.
#[derive(Debug, Clone)]
pub struct BillingRun {
    pub period: BillingPeriod,
    pub entries: Vec<CleanEntry>,
    pub client_summaries: Vec<ClientPeriodSummary>,
    pub person_summaries: Vec<PersonSummary>,
    pub monthly_breakdown: Vec<MonthlyBreakdownRow>,
    pub new_budget: BudgetState,
    pub warnings: Vec<Warning>,
}

impl BillingRun {
    pub fn total_hours(&self) -> f64 {
        self.entries.iter().map(|e| e.hours).sum()
    }

    pub fn total_amount(&self) -> f64 {
        self.client_summaries.iter().filter_map(|s| s.billed).sum()
    }
}

pub struct BillingProcessor;

impl BillingProcessor {
    /// Runs the full reconciliation over already-ingested raw entries:
    /// normalize, bill, track budgets, collect warnings. Row-level problems
    /// become warnings; only configuration problems abort, and they abort
    /// before any row is processed.
    pub fn process(config: &BillingConfig, raw_entries: &[TimeEntry]) -> Result<BillingRun> {
        validate_config_integrity(config)?;

        if raw_entries.is_empty() {
            return Err(BillingError::EmptyExport(
                "no rows supplied to the processor".to_string(),
            ));
        }

        info!("Processing {} raw time entries", raw_entries.len());

        let batch = normalize_entries(raw_entries, config);
        let period = run_period(&batch.entries, raw_entries);

        let (billings, rate_warnings) = bill_clients(&batch.entries, &config.billing_rates);
        let tracker = track_budgets(&billings, config, period);

        let person_summaries = summarize_people(&batch.entries);
        let breakdown = monthly_breakdown(&batch.entries, &config.billing_rates);

        let mut warnings = batch.warnings;
        warnings.extend(rate_warnings);

        let run = BillingRun {
            period,
            entries: batch.entries,
            client_summaries: tracker.summaries,
            person_summaries,
            monthly_breakdown: breakdown,
            new_budget: tracker.new_state,
            warnings,
        };

        info!(
            "Period {}: {} entries, {:.2} hours, {:.2} billed, {} warnings",
            run.period,
            run.entries.len(),
            run.total_hours(),
            run.total_amount(),
            run.warnings.len()
        );
        debug!(
            "Proposed budget state for next period: {:?}",
            run.new_budget
        );

        Ok(run)
    }
}

/// The run is keyed to the month of the earliest entry; entries from
/// neighboring months still appear in the monthly breakdown under their own
/// label.
fn run_period(entries: &[CleanEntry], raw_entries: &[TimeEntry]) -> BillingPeriod {
    entries
        .iter()
        .map(|e| e.date)
        .chain(raw_entries.iter().map(|e| e.date))
        .min()
        .map(BillingPeriod::from_date)
        // Unreachable in practice: the processor rejects empty inputs.
        .unwrap_or(BillingPeriod {
            year: 1970,
            month: 1,
        })
}

pub fn process_billing_run(config: &BillingConfig, raw_entries: &[TimeEntry]) -> Result<BillingRun> {
    BillingProcessor::process(config, raw_entries)
}

/// Reads a raw export CSV and runs the full reconciliation over it.
pub fn process_export_file<P: AsRef<Path>>(
    config: &BillingConfig,
    path: P,
) -> Result<BillingRun> {
    validate_config_integrity(config)?;
    let raw_entries = read_export(path, &config.column_mapping)?;
    BillingProcessor::process(config, &raw_entries)
}

/// Rejects configurations that would make downstream totals meaningless.
/// Runs before any row is touched, so a fatal configuration never produces
/// a partial or misleading artifact.
pub fn validate_config_integrity(config: &BillingConfig) -> Result<()> {
    if config.billing_rates.is_empty() {
        return Err(BillingError::MissingConfiguration(
            "billing_rates is empty; no client can be billed".to_string(),
        ));
    }

    for (client, rate) in &config.billing_rates {
        if !rate.is_finite() || *rate <= 0.0 {
            return Err(BillingError::InvalidRate {
                client: client.clone(),
                rate: *rate,
            });
        }
    }

    if !config.alert_threshold_months.is_finite() || config.alert_threshold_months < 0.0 {
        return Err(BillingError::InvalidAlertThreshold(
            config.alert_threshold_months,
        ));
    }

    if config.burn_rate.lookback_periods == 0 {
        return Err(BillingError::InvalidLookback(0));
    }

    for spends in config.spend_history.values() {
        for spend in spends {
            BillingPeriod::parse(&spend.period)?;
        }
    }

    Ok(())
}
