use crate::error::{BillingError, Result};
use crate::schema::ColumnMapping;
use chrono::NaiveDate;
use log::info;
use std::path::Path;

/// One row of the raw time-tracking export, untouched apart from date
/// parsing. Duration and category stay raw until normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntry {
    pub person: String,
    pub date: NaiveDate,
    pub raw_duration: String,
    pub raw_category: String,
    pub task: String,
    pub task_id: String,
}

struct ColumnIndices {
    person: usize,
    date: usize,
    duration: usize,
    category: usize,
    task: usize,
    task_id: usize,
}

impl ColumnIndices {
    fn resolve(headers: &csv::StringRecord, mapping: &ColumnMapping) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| BillingError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            person: find(&mapping.person)?,
            date: find(&mapping.date)?,
            duration: find(&mapping.duration)?,
            category: find(&mapping.category)?,
            task: find(&mapping.task)?,
            task_id: find(&mapping.task_id)?,
        })
    }

    fn entry_from_record(&self, record: &csv::StringRecord) -> Result<TimeEntry> {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();

        Ok(TimeEntry {
            person: field(self.person),
            date: parse_entry_date(&field(self.date))?,
            raw_duration: field(self.duration),
            raw_category: field(self.category),
            task: field(self.task),
            task_id: field(self.task_id),
        })
    }
}

/// Parses the start date of an export row. Export timestamps look like
/// "09/29/2025, 1:23:21 PM EDT"; only the date part before the comma is
/// kept. Plain ISO dates are accepted as well.
pub fn parse_entry_date(raw: &str) -> Result<NaiveDate> {
    let date_part = raw.split(',').next().unwrap_or(raw).trim();

    NaiveDate::parse_from_str(date_part, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y-%m-%d"))
        .map_err(|_| BillingError::DateError(format!("Unrecognized entry date '{}'", raw)))
}

/// Reads a raw export CSV into time entries using the configured column
/// mapping. An export with a valid header but no data rows is an error;
/// downstream totals would be meaningless.
pub fn read_export<P: AsRef<Path>>(path: P, mapping: &ColumnMapping) -> Result<Vec<TimeEntry>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let indices = ColumnIndices::resolve(&headers, mapping)?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        entries.push(indices.entry_from_record(&record)?);
    }

    if entries.is_empty() {
        return Err(BillingError::EmptyExport(path.display().to_string()));
    }

    info!(
        "Read {} time entries from {}",
        entries.len(),
        path.display()
    );

    Ok(entries)
}
