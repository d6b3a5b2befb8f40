use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Maps export column headers to the fields this pipeline consumes.
/// Defaults match the ClickUp time-tracking export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ColumnMapping {
    #[schemars(description = "Header of the column holding the team member name")]
    pub person: String,

    #[schemars(description = "Header of the column holding the entry start date")]
    pub date: String,

    #[schemars(description = "Header of the column holding the tracked duration")]
    pub duration: String,

    #[schemars(description = "Header of the column holding the raw category tag")]
    pub category: String,

    #[schemars(description = "Header of the column holding the task name")]
    pub task: String,

    #[schemars(description = "Header of the column holding the task identifier")]
    pub task_id: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            person: "Username".to_string(),
            date: "Start Text".to_string(),
            duration: "Time Tracked Text".to_string(),
            category: "CATEGORY".to_string(),
            task: "Task Name".to_string(),
            task_id: "Custom Task ID".to_string(),
        }
    }
}

/// Controls the trailing window used to project budget depletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct BurnRateConfig {
    #[serde(default = "default_lookback_periods")]
    #[schemars(
        description = "Number of billing periods in the trailing burn-rate window, current period included when include_current_period is set"
    )]
    pub lookback_periods: usize,

    #[serde(default = "default_include_current_period")]
    #[schemars(
        description = "Whether the current period's billed amount enters the burn-rate window. When false the window uses prior-period history only, falling back to the current amount if no history exists."
    )]
    pub include_current_period: bool,
}

impl Default for BurnRateConfig {
    fn default() -> Self {
        Self {
            lookback_periods: default_lookback_periods(),
            include_current_period: default_include_current_period(),
        }
    }
}

/// Output filename templates. "{year}" and "{month}" are replaced with the
/// zero-padded run period components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct OutputTemplates {
    #[serde(default = "default_accounting_csv_template")]
    #[schemars(description = "Filename template for the accounting CSV artifact")]
    pub accounting_csv: String,

    #[serde(default = "default_summary_report_template")]
    #[schemars(description = "Filename template for the Markdown summary artifact")]
    pub summary_report: String,
}

impl Default for OutputTemplates {
    fn default() -> Self {
        Self {
            accounting_csv: default_accounting_csv_template(),
            summary_report: default_summary_report_template(),
        }
    }
}

impl OutputTemplates {
    pub fn accounting_csv_filename(&self, period: crate::utils::BillingPeriod) -> String {
        render_template(&self.accounting_csv, period)
    }

    pub fn summary_report_filename(&self, period: crate::utils::BillingPeriod) -> String {
        render_template(&self.summary_report, period)
    }
}

fn render_template(template: &str, period: crate::utils::BillingPeriod) -> String {
    template
        .replace("{year}", &format!("{:04}", period.year))
        .replace("{month}", &format!("{:02}", period.month))
}

/// One prior billing period's spend for a client, used as burn-rate history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PeriodSpend {
    #[schemars(description = "Billing period label in YYYY-MM format")]
    pub period: String,

    #[schemars(description = "Amount billed to the client in that period")]
    pub amount: f64,
}

/// The full configuration surface for one billing run. Built once, passed
/// immutably into every component, and never mutated mid-run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BillingConfig {
    #[serde(default)]
    #[schemars(description = "Maps raw export column headers to pipeline fields")]
    pub column_mapping: ColumnMapping,

    #[serde(default)]
    #[schemars(
        description = "Exact-match mapping from raw category tags to canonical client names. Case-sensitive; tags not listed here are reported as unmapped."
    )]
    pub category_map: BTreeMap<String, String>,

    #[schemars(
        description = "Hourly billing rate per client. Every client receiving billable hours must have an entry; an empty table aborts the run."
    )]
    pub billing_rates: BTreeMap<String, f64>,

    #[serde(default)]
    #[schemars(
        description = "Remaining contracted budget per client as of the start of the current period. The run computes the post-period state; persisting it for the next run is the operator's explicit step."
    )]
    pub remaining_budget: BTreeMap<String, f64>,

    #[serde(default)]
    #[schemars(
        description = "Billed amounts from prior periods per client, consumed by the trailing burn-rate window"
    )]
    pub spend_history: BTreeMap<String, Vec<PeriodSpend>>,

    #[serde(default = "default_alert_threshold_months")]
    #[schemars(
        description = "Months-remaining threshold below which a client enters the alert state"
    )]
    pub alert_threshold_months: f64,

    #[serde(default)]
    pub burn_rate: BurnRateConfig,

    #[serde(default)]
    pub output: OutputTemplates,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            column_mapping: ColumnMapping::default(),
            category_map: BTreeMap::new(),
            billing_rates: BTreeMap::new(),
            remaining_budget: BTreeMap::new(),
            spend_history: BTreeMap::new(),
            alert_threshold_months: default_alert_threshold_months(),
            burn_rate: BurnRateConfig::default(),
            output: OutputTemplates::default(),
        }
    }
}

impl BillingConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BillingConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

fn default_alert_threshold_months() -> f64 {
    2.0
}

fn default_lookback_periods() -> usize {
    3
}

fn default_include_current_period() -> bool {
    true
}

fn default_accounting_csv_template() -> String {
    "billing_report_{year}-{month}.csv".to_string()
}

fn default_summary_report_template() -> String {
    "billing_summary_{year}-{month}.md".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::BillingPeriod;

    #[test]
    fn test_schema_generation() {
        let schema_json = BillingConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("billing_rates"));
        assert!(schema_json.contains("remaining_budget"));
        assert!(schema_json.contains("category_map"));
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: BillingConfig = serde_json::from_str(
            r#"{
                "billing_rates": { "Job News": 175.0 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.alert_threshold_months, 2.0);
        assert_eq!(config.burn_rate.lookback_periods, 3);
        assert!(config.burn_rate.include_current_period);
        assert_eq!(config.column_mapping.person, "Username");
        assert!(config.category_map.is_empty());
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut config = BillingConfig::default();
        config
            .billing_rates
            .insert("Tri County Home Care".to_string(), 150.0);
        config
            .remaining_budget
            .insert("Tri County Home Care".to_string(), 3000.0);
        config.spend_history.insert(
            "Tri County Home Care".to_string(),
            vec![PeriodSpend {
                period: "2025-08".to_string(),
                amount: 250.0,
            }],
        );

        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: BillingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.billing_rates["Tri County Home Care"], 150.0);
        assert_eq!(
            deserialized.spend_history["Tri County Home Care"][0].period,
            "2025-08"
        );
    }

    #[test]
    fn test_output_templates() {
        let templates = OutputTemplates::default();
        let period = BillingPeriod::new(2025, 9).unwrap();
        assert_eq!(
            templates.accounting_csv_filename(period),
            "billing_report_2025-09.csv"
        );
        assert_eq!(
            templates.summary_report_filename(period),
            "billing_summary_2025-09.md"
        );
    }
}
