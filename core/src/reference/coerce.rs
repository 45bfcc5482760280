//! Field coercion for raw tabular rows. Failures surface as
//! [`DataQualityIssue`]s so the caller can drop and count the row.

use crate::prelude::DataQualityIssue;
use chrono::{NaiveDate, NaiveDateTime};

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Accepts integers and integral decimals such as `"3.0"`.
pub fn coerce_floor(raw: &str) -> Result<i32, DataQualityIssue> {
    let trimmed = raw.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| DataQualityIssue::NonNumericFloor(trimmed.to_string()))?;
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
        return Err(DataQualityIssue::NonNumericFloor(trimmed.to_string()));
    }
    Ok(value as i32)
}

/// Empty and NaN cells are missing values rather than errors.
pub fn coerce_coordinate(field: &str, raw: &str) -> Result<Option<f64>, DataQualityIssue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| DataQualityIssue::NonNumericCoordinate {
            field: field.to_string(),
            value: trimmed.to_string(),
        })?;
    Ok(value.is_finite().then_some(value))
}

/// Non-negative integral counter; an empty cell counts as zero.
pub fn coerce_count(field: &str, raw: &str) -> Result<u64, DataQualityIssue> {
    let value = coerce_duration(field, raw)?;
    if value.fract() != 0.0 {
        return Err(DataQualityIssue::NonNumericCounter {
            field: field.to_string(),
            value: raw.trim().to_string(),
        });
    }
    Ok(value as u64)
}

/// Non-negative real counter; an empty cell counts as zero.
pub fn coerce_duration(field: &str, raw: &str) -> Result<f64, DataQualityIssue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(DataQualityIssue::NonNumericCounter {
            field: field.to_string(),
            value: trimmed.to_string(),
        }),
    }
}

/// Accepts bare dates (midnight) and ISO-like date-times.
pub fn coerce_timestamp(raw: &str) -> Result<NaiveDateTime, DataQualityIssue> {
    let trimmed = raw.trim();
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DataQualityIssue::InvalidTimestamp(trimmed.to_string()))
}
