use crate::normalize::CleanEntry;
use crate::utils::BillingPeriod;
use crate::Warning;
use log::debug;
use std::collections::BTreeMap;

/// Per-client billing for one run. `billed` is None exactly when the client
/// has billable hours but no configured rate; the run continues and the
/// summary carries the marker instead of a fabricated zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientBilling {
    pub client: String,
    pub hours: f64,
    pub rate: Option<f64>,
    pub billed: Option<f64>,
}

/// Hours per person across all clients in the period. Billing is
/// client-scoped, so there is no monetary amount here.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonSummary {
    pub person: String,
    pub hours: f64,
}

/// One client's hours and amount within one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyBreakdownRow {
    pub client: String,
    pub period: String,
    pub hours: f64,
    pub amount: Option<f64>,
}

/// Joins normalized entries with the rate table. Amounts are computed once
/// on the summed hours per client, never per entry, so no intermediate
/// rounding can drift; display rounding happens at the report boundary.
pub fn bill_clients(
    entries: &[CleanEntry],
    rates: &BTreeMap<String, f64>,
) -> (Vec<ClientBilling>, Vec<Warning>) {
    let mut hours_by_client: BTreeMap<&str, f64> = BTreeMap::new();
    for entry in entries {
        if let Some(client) = entry.client.as_deref() {
            *hours_by_client.entry(client).or_default() += entry.hours;
        }
    }

    let mut billings = Vec::with_capacity(hours_by_client.len());
    let mut warnings = Vec::new();

    for (client, hours) in hours_by_client {
        let rate = rates.get(client).copied();
        let billed = rate.map(|rate| hours * rate);

        if rate.is_none() {
            warnings.push(Warning::MissingRate {
                client: client.to_string(),
                hours,
            });
        }

        debug!(
            "Client {}: {:.2} hours, billed {:?}",
            client, hours, billed
        );

        billings.push(ClientBilling {
            client: client.to_string(),
            hours,
            rate,
            billed,
        });
    }

    (billings, warnings)
}

/// Total hours per person, every parsed row included. Unmapped rows still
/// represent worked time even though they carry no client.
pub fn summarize_people(entries: &[CleanEntry]) -> Vec<PersonSummary> {
    let mut hours_by_person: BTreeMap<&str, f64> = BTreeMap::new();
    for entry in entries {
        *hours_by_person.entry(entry.person.as_str()).or_default() += entry.hours;
    }

    hours_by_person
        .into_iter()
        .map(|(person, hours)| PersonSummary {
            person: person.to_string(),
            hours,
        })
        .collect()
}

/// Client totals split by calendar month, for entries that resolved to a
/// client. Ordered by client, then month.
pub fn monthly_breakdown(
    entries: &[CleanEntry],
    rates: &BTreeMap<String, f64>,
) -> Vec<MonthlyBreakdownRow> {
    let mut hours_by_cell: BTreeMap<(&str, BillingPeriod), f64> = BTreeMap::new();
    for entry in entries {
        if let Some(client) = entry.client.as_deref() {
            let period = BillingPeriod::from_date(entry.date);
            *hours_by_cell.entry((client, period)).or_default() += entry.hours;
        }
    }

    hours_by_cell
        .into_iter()
        .map(|((client, period), hours)| MonthlyBreakdownRow {
            client: client.to_string(),
            period: period.label(),
            hours,
            amount: rates.get(client).map(|rate| hours * rate),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn clean(person: &str, date: &str, hours: f64, client: Option<&str>) -> CleanEntry {
        CleanEntry {
            person: person.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            hours,
            client: client.map(str::to_string),
            raw_category: client.unwrap_or("UNKNOWN").to_string(),
            task: "Task".to_string(),
            task_id: "T1".to_string(),
        }
    }

    fn rates() -> BTreeMap<String, f64> {
        let mut rates = BTreeMap::new();
        rates.insert("Job News".to_string(), 175.0);
        rates.insert("Tri County Home Care".to_string(), 150.0);
        rates
    }

    #[test]
    fn test_billed_equals_summed_hours_times_rate() {
        let entries = vec![
            clean("Alice", "2025-09-01", 0.1, Some("Job News")),
            clean("Alice", "2025-09-02", 0.1, Some("Job News")),
            clean("Bob", "2025-09-03", 0.1, Some("Job News")),
        ];

        let (billings, warnings) = bill_clients(&entries, &rates());
        assert!(warnings.is_empty());
        assert_eq!(billings.len(), 1);

        let total_hours = 0.1 + 0.1 + 0.1;
        assert_eq!(billings[0].hours, total_hours);
        assert_eq!(billings[0].billed, Some(total_hours * 175.0));
    }

    #[test]
    fn test_missing_rate_is_marked_not_zeroed() {
        let entries = vec![
            clean("Alice", "2025-09-01", 2.0, Some("Job News")),
            clean("Bob", "2025-09-02", 3.0, Some("Acme")),
        ];

        let (billings, warnings) = bill_clients(&entries, &rates());
        assert_eq!(billings.len(), 2);

        let acme = billings.iter().find(|b| b.client == "Acme").unwrap();
        assert_eq!(acme.rate, None);
        assert_eq!(acme.billed, None);
        assert_eq!(acme.hours, 3.0);

        let job_news = billings.iter().find(|b| b.client == "Job News").unwrap();
        assert_eq!(job_news.billed, Some(350.0));

        assert_eq!(warnings.len(), 1);
        assert!(matches!(&warnings[0], Warning::MissingRate { client, .. } if client == "Acme"));
    }

    #[test]
    fn test_unmapped_entries_excluded_from_client_billing() {
        let entries = vec![
            clean("Alice", "2025-09-01", 2.0, Some("Job News")),
            clean("Alice", "2025-09-01", 5.0, None),
        ];

        let (billings, warnings) = bill_clients(&entries, &rates());
        assert!(warnings.is_empty());
        assert_eq!(billings.len(), 1);
        assert_eq!(billings[0].hours, 2.0);
    }

    #[test]
    fn test_person_summaries_include_unmapped_hours() {
        let entries = vec![
            clean("Alice", "2025-09-01", 2.0, Some("Job News")),
            clean("Alice", "2025-09-02", 1.0, None),
            clean("Bob", "2025-09-03", 1.5, Some("Tri County Home Care")),
        ];

        let people = summarize_people(&entries);
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].person, "Alice");
        assert_eq!(people[0].hours, 3.0);
        assert_eq!(people[1].person, "Bob");
        assert_eq!(people[1].hours, 1.5);
    }

    #[test]
    fn test_monthly_breakdown_splits_months() {
        let entries = vec![
            clean("Alice", "2025-08-29", 1.0, Some("Job News")),
            clean("Alice", "2025-09-01", 2.0, Some("Job News")),
            clean("Bob", "2025-09-02", 1.5, Some("Tri County Home Care")),
        ];

        let rows = monthly_breakdown(&entries, &rates());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].client, "Job News");
        assert_eq!(rows[0].period, "2025-08");
        assert_eq!(rows[0].amount, Some(175.0));
        assert_eq!(rows[1].period, "2025-09");
        assert_eq!(rows[1].amount, Some(350.0));
        assert_eq!(rows[2].client, "Tri County Home Care");
    }
}
