use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Invalid billing rate {rate} for client '{client}': must be greater than zero")]
    InvalidRate { client: String, rate: f64 },

    #[error("Invalid alert threshold {0}: must be non-negative")]
    InvalidAlertThreshold(f64),

    #[error("Invalid burn-rate lookback {0}: must be at least 1 period")]
    InvalidLookback(usize),

    #[error("Archive collision for period {period}: {path} already contains archived files")]
    ArchiveCollision {
        period: String,
        path: std::path::PathBuf,
    },

    #[error("No time entries found in export: {0}")]
    EmptyExport(String),

    #[error("Missing column '{0}' in export header")]
    MissingColumn(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
