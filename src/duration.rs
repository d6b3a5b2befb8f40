use thiserror::Error;

/// A duration string that could not be converted to decimal hours.
/// The original text is preserved so the row can be reported for audit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse duration '{raw}'")]
pub struct DurationParseError {
    pub raw: String,
}

/// Converts a raw time-tracking duration string into decimal hours.
///
/// Accepted forms, tried in order:
/// 1. Colon-delimited elapsed time: "2:30:00" or "2:30". This is elapsed
///    time, not wall-clock time, so "25:00:00" is valid and means 25 hours.
/// 2. Plain decimal hours: "2.5".
/// 3. Human text: "2h 30m", "45m", "2h".
///
/// Empty or whitespace-only input is a parse failure, never zero hours.
pub fn parse_duration(raw: &str) -> Result<f64, DurationParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError {
            raw: raw.to_string(),
        });
    }

    if let Some(hours) = parse_clock_format(trimmed) {
        return Ok(hours);
    }

    if let Ok(hours) = trimmed.parse::<f64>() {
        if hours.is_finite() && hours >= 0.0 {
            return Ok(hours);
        }
        return Err(DurationParseError {
            raw: raw.to_string(),
        });
    }

    if let Some(hours) = parse_human_format(trimmed) {
        return Ok(hours);
    }

    Err(DurationParseError {
        raw: raw.to_string(),
    })
}

/// "HH:MM" or "HH:MM:SS". Minutes and seconds must be below 60; the hour
/// field is unbounded.
fn parse_clock_format(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }

    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    let seconds: u32 = if parts.len() == 3 {
        let seconds = parts[2].parse().ok()?;
        if seconds >= 60 {
            return None;
        }
        seconds
    } else {
        0
    };

    Some(f64::from(hours) + f64::from(minutes) / 60.0 + f64::from(seconds) / 3600.0)
}

/// Whitespace-separated tokens of the form "<number>h" or "<number>m".
/// Every token must carry a unit; a bare number here means the decimal
/// branch already rejected it.
fn parse_human_format(s: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = false;

    for token in s.split_whitespace() {
        let (value_text, divisor) = if let Some(v) = strip_unit(token, 'h') {
            (v, 1.0)
        } else if let Some(v) = strip_unit(token, 'm') {
            (v, 60.0)
        } else {
            return None;
        };

        let value: f64 = value_text.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total += value / divisor;
        matched = true;
    }

    if matched {
        Some(total)
    } else {
        None
    }
}

fn strip_unit(token: &str, unit: char) -> Option<&str> {
    token
        .strip_suffix(unit)
        .or_else(|| token.strip_suffix(unit.to_ascii_uppercase()))
        .filter(|rest| !rest.is_empty())
}
