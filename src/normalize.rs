//! Normalization of raw rows into the read-only dataset snapshot.
//!
//! Labels are trimmed and known department aliases collapse to a single
//! spelling. Dates are parsed up front; one bad date fails the whole load.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{AppError, Result};
use crate::models::{Observation, RawObservation, Temperatures};

/// Known malformed department labels and their canonical spelling.
const DEPARTMENT_ALIASES: &[(&str, &str)] =
    &[("SAN ANDRES Y  PROVIDENCIA", "SAN ANDRES Y PROVIDENCIA")];

// ---

/// The normalized, immutable table every dashboard request reads from.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDataset {
    observations: Vec<Observation>,
}

/// Normalize a full table fetch.
///
/// Returns [`AppError::InvalidDate`] for the first row whose date cannot be
/// parsed; no partial dataset is produced.
pub fn normalize(rows: Vec<RawObservation>) -> Result<NormalizedDataset> {
    // ---
    let observations = rows
        .into_iter()
        .enumerate()
        .map(|(row, raw)| -> Result<Observation> {
            let date = parse_date(&raw.date).ok_or_else(|| AppError::InvalidDate {
                row,
                value: raw.date.clone(),
            })?;
            Ok(Observation {
                date,
                station_code: raw.station_code,
                municipality: raw.municipality.trim().to_string(),
                department: canonical_department(&raw.department),
                latitude: raw.latitude,
                longitude: raw.longitude,
                temps: Temperatures {
                    temp_min: raw.temp_min,
                    temp_avg: raw.temp_avg,
                    temp_max: raw.temp_max,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("normalized {} observations", observations.len());
    Ok(NormalizedDataset { observations })
}

/// Trimmed department label with known aliases merged.
pub fn canonical_department(label: &str) -> String {
    // ---
    DEPARTMENT_ALIASES
        .iter()
        .fold(label.trim().to_string(), |acc, (alias, canonical)| {
            acc.replace(alias, canonical)
        })
}

/// Parse the calendar date of a source value.
///
/// Accepts plain dates, `YYYY-MM-DD HH:MM:SS[.fff]` (space or `T`) and
/// RFC 3339 timestamps; any time of day is dropped.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    parse_timestamp(value).map(|dt| dt.date())
}

/// Parse a date or date-time value. Plain dates mean midnight; RFC 3339
/// offsets are dropped and the wall-clock time kept.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    // ---
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_local())
}

impl NormalizedDataset {
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Earliest and latest observation dates, if any rows exist.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        // ---
        let min = self.observations.iter().map(|o| o.date).min()?;
        let max = self.observations.iter().map(|o| o.date).max()?;
        Some((min, max))
    }

    /// Distinct departments, sorted ascending.
    pub fn departments(&self) -> Vec<String> {
        // ---
        self.observations
            .iter()
            .map(|o| o.department.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Distinct municipalities of one department, sorted ascending.
    pub fn municipalities(&self, department: &str) -> Vec<String> {
        // ---
        self.observations
            .iter()
            .filter(|o| o.department == department)
            .map(|o| o.municipality.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }
}
