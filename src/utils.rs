use crate::error::{BillingError, Result};
use chrono::{Datelike, Days, NaiveDate};
use std::fmt;

/// One calendar month of tracked time, reconciled against budget in arrears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::DateError(format!(
                "Invalid month {}: must be between 1 and 12",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses a period label in the format "YYYY-MM".
    pub fn parse(label: &str) -> Result<Self> {
        let first = format!("{}-01", label.trim());
        let date = NaiveDate::parse_from_str(&first, "%Y-%m-%d").map_err(|_| {
            BillingError::DateError(format!(
                "Invalid period format: {}. Expected YYYY-MM",
                label
            ))
        })?;
        Ok(Self::from_date(date))
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    pub fn last_day(&self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

/// Display-boundary rounding to two decimal places, half away from zero.
/// Totals are computed on unrounded values and only rounded here.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2025, 12),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_period_parse_and_label() {
        let period = BillingPeriod::parse("2025-09").unwrap();
        assert_eq!(period.year, 2025);
        assert_eq!(period.month, 9);
        assert_eq!(period.label(), "2025-09");
        assert_eq!(
            period.first_day(),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
        );
        assert_eq!(
            period.last_day(),
            NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()
        );

        assert!(BillingPeriod::parse("September 2025").is_err());
        assert!(BillingPeriod::new(2025, 13).is_err());
    }

    #[test]
    fn test_period_ordering() {
        let august = BillingPeriod::parse("2025-08").unwrap();
        let september = BillingPeriod::parse("2025-09").unwrap();
        let january = BillingPeriod::parse("2026-01").unwrap();
        assert!(august < september);
        assert!(september < january);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(350.0), 350.0);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
    }
}
