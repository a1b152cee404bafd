//! Municipality selection: daily series and the dropdown defaults that
//! drive it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Observation, TemperatureSums, Temperatures};
use crate::normalize::NormalizedDataset;

/// One day of a municipality's record, averaged across reporting stations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub temps: Temperatures,
}

/// Daily points ordered by date, newest first. Dates are unique.
pub type DailySeries = Vec<DailyPoint>;

/// Daily series of one municipality across the whole dataset.
///
/// An unknown municipality yields an empty series.
pub fn daily_series(dataset: &NormalizedDataset, municipality: &str) -> DailySeries {
    // ---
    collect_daily(
        dataset
            .observations()
            .iter()
            .filter(|o| o.municipality == municipality),
    )
}

/// Daily series of one municipality restricted to one department, as the
/// dashboard requests it (municipality names repeat across departments).
pub fn daily_series_in(
    dataset: &NormalizedDataset,
    department: &str,
    municipality: &str,
) -> DailySeries {
    // ---
    collect_daily(
        dataset
            .observations()
            .iter()
            .filter(|o| o.department == department && o.municipality == municipality),
    )
}

fn collect_daily<'a>(rows: impl Iterator<Item = &'a Observation>) -> DailySeries {
    // ---
    let mut by_date: BTreeMap<NaiveDate, TemperatureSums> = BTreeMap::new();
    for o in rows {
        by_date.entry(o.date).or_default().add(&o.temps);
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, sums)| DailyPoint {
            date,
            temps: sums.mean(),
        })
        .collect()
}

/// Options and default selection for the municipality control.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityChoices {
    pub options: Vec<String>,
    pub default: Option<String>,
}

/// Municipalities of `department`, defaulting to `preferred` when the
/// department has it and to the first alphabetically otherwise.
pub fn municipality_choices(
    dataset: &NormalizedDataset,
    department: &str,
    preferred: &str,
) -> MunicipalityChoices {
    // ---
    let options = dataset.municipalities(department);
    let default = if options.iter().any(|m| m == preferred) {
        Some(preferred.to_string())
    } else {
        options.first().cloned()
    };
    MunicipalityChoices { options, default }
}
