//! Data models for the temperature pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---

/// One row exactly as the data source returns it; the date is still text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawObservation {
    // ---
    pub date: String,
    pub station_code: String,
    pub municipality: String,
    pub department: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temp_min: Option<f64>,
    pub temp_avg: Option<f64>,
    pub temp_max: Option<f64>,
}

/// A normalized row: trimmed labels, canonical department, parsed date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    // ---
    pub date: NaiveDate,
    pub station_code: String,
    pub municipality: String,
    pub department: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub temps: Temperatures,
}

/// A fully specified row for insertion. Every column is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    // ---
    pub date: NaiveDate,
    pub station_code: String,
    pub municipality: String,
    pub department: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temp_min: f64,
    pub temp_avg: f64,
    pub temp_max: f64,
}

impl From<NewObservation> for RawObservation {
    fn from(row: NewObservation) -> Self {
        // ---
        RawObservation {
            date: row.date.format("%Y-%m-%d").to_string(),
            station_code: row.station_code,
            municipality: row.municipality,
            department: row.department,
            latitude: row.latitude,
            longitude: row.longitude,
            temp_min: Some(row.temp_min),
            temp_avg: Some(row.temp_avg),
            temp_max: Some(row.temp_max),
        }
    }
}

impl RawObservation {
    /// Overwrite one column in place. The value kind must already match the
    /// column (see [`Column::parse_value`]).
    pub fn set(&mut self, column: Column, value: &ColumnValue) -> Result<()> {
        // ---
        match (column, value) {
            (Column::Date, ColumnValue::Date(d)) => self.date = d.format("%Y-%m-%d").to_string(),
            (Column::StationCode, ColumnValue::Text(s)) => self.station_code = s.clone(),
            (Column::Municipality, ColumnValue::Text(s)) => self.municipality = s.clone(),
            (Column::Department, ColumnValue::Text(s)) => self.department = s.clone(),
            (Column::Latitude, ColumnValue::Number(n)) => self.latitude = *n,
            (Column::Longitude, ColumnValue::Number(n)) => self.longitude = *n,
            (Column::TempMin, ColumnValue::Number(n)) => self.temp_min = Some(*n),
            (Column::TempAvg, ColumnValue::Number(n)) => self.temp_avg = Some(*n),
            (Column::TempMax, ColumnValue::Number(n)) => self.temp_max = Some(*n),
            (column, value) => {
                return Err(AppError::BadRequest(format!(
                    "value {:?} does not fit column {}",
                    value,
                    column.name()
                )))
            }
        }
        Ok(())
    }
}

// ---

/// The three daily temperature statistics, in °C. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Temperatures {
    // ---
    pub temp_min: Option<f64>,
    pub temp_avg: Option<f64>,
    pub temp_max: Option<f64>,
}

/// Running sums for an unweighted mean of [`Temperatures`]; missing values
/// are skipped per variable.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TemperatureSums {
    sums: [f64; 3],
    counts: [u32; 3],
}

impl TemperatureSums {
    pub(crate) fn add(&mut self, temps: &Temperatures) {
        // ---
        for (i, value) in [temps.temp_min, temps.temp_avg, temps.temp_max]
            .into_iter()
            .enumerate()
        {
            if let Some(v) = value.filter(|v| !v.is_nan()) {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    pub(crate) fn mean(&self) -> Temperatures {
        // ---
        let avg = |i: usize| (self.counts[i] > 0).then(|| self.sums[i] / f64::from(self.counts[i]));
        Temperatures {
            temp_min: avg(0),
            temp_avg: avg(1),
            temp_max: avg(2),
        }
    }
}

// ---

/// The temperature statistic a chart is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    TempMin,
    TempAvg,
    TempMax,
}

impl Variable {
    pub const ALL: [Variable; 3] = [Variable::TempMax, Variable::TempAvg, Variable::TempMin];

    pub fn column(self) -> &'static str {
        match self {
            Variable::TempMin => "temp_min",
            Variable::TempAvg => "temp_avg",
            Variable::TempMax => "temp_max",
        }
    }

    /// Display label used in chart titles.
    pub fn label(self) -> &'static str {
        match self {
            Variable::TempMin => "Temperatura mínima",
            Variable::TempAvg => "Temperatura promedio",
            Variable::TempMax => "Temperatura máxima",
        }
    }

    pub fn pick(self, temps: &Temperatures) -> Option<f64> {
        match self {
            Variable::TempMin => temps.temp_min,
            Variable::TempAvg => temps.temp_avg,
            Variable::TempMax => temps.temp_max,
        }
    }
}

// ---

/// The columns of the temperature table, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Date,
    StationCode,
    Municipality,
    Department,
    Latitude,
    Longitude,
    TempMin,
    TempAvg,
    TempMax,
}

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    Date,
}

/// A typed value bound into an update statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Date,
        Column::StationCode,
        Column::Municipality,
        Column::Department,
        Column::Latitude,
        Column::Longitude,
        Column::TempMin,
        Column::TempAvg,
        Column::TempMax,
    ];

    /// SQL identifier of the column. Only these fixed names ever reach
    /// statement text.
    pub fn name(self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::StationCode => "station_code",
            Column::Municipality => "municipality",
            Column::Department => "department",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::TempMin => "temp_min",
            Column::TempAvg => "temp_avg",
            Column::TempMax => "temp_max",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Column::Date => ValueKind::Date,
            Column::StationCode | Column::Municipality | Column::Department => ValueKind::Text,
            _ => ValueKind::Number,
        }
    }

    /// Interpret a JSON value as a value for this column.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings; dates must be
    /// `YYYY-MM-DD`.
    pub fn parse_value(self, value: &serde_json::Value) -> Result<ColumnValue> {
        // ---
        let bad = || {
            AppError::BadRequest(format!(
                "invalid value {} for column {}",
                value,
                self.name()
            ))
        };
        match self.kind() {
            ValueKind::Text => value
                .as_str()
                .map(|s| ColumnValue::Text(s.to_string()))
                .ok_or_else(bad),
            ValueKind::Number => match value {
                serde_json::Value::Number(n) => n.as_f64().map(ColumnValue::Number).ok_or_else(bad),
                serde_json::Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(ColumnValue::Number)
                    .ok_or_else(bad),
                _ => Err(bad()),
            },
            ValueKind::Date => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .map(ColumnValue::Date)
                .ok_or_else(bad),
        }
    }
}

impl ColumnValue {
    /// Textual form, as sent to the warehouse parameter API.
    pub fn to_param_string(&self) -> String {
        match self {
            ColumnValue::Text(s) => s.clone(),
            ColumnValue::Number(n) => n.to_string(),
            ColumnValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn raw() -> RawObservation {
        // ---
        RawObservation {
            date: "2020-01-01".to_string(),
            station_code: "2701".to_string(),
            municipality: "MEDELLÍN".to_string(),
            department: "ANTIOQUIA".to_string(),
            latitude: 6.25,
            longitude: -75.56,
            temp_min: Some(15.0),
            temp_avg: Some(21.0),
            temp_max: Some(28.0),
        }
    }

    #[test]
    fn test_mean_skips_missing_values() {
        // ---
        let mut sums = TemperatureSums::default();
        sums.add(&Temperatures {
            temp_min: Some(10.0),
            temp_avg: None,
            temp_max: Some(30.0),
        });
        sums.add(&Temperatures {
            temp_min: Some(14.0),
            temp_avg: None,
            temp_max: Some(f64::NAN),
        });

        let mean = sums.mean();
        assert_eq!(mean.temp_min, Some(12.0));
        assert_eq!(mean.temp_avg, None);
        assert_eq!(mean.temp_max, Some(30.0));
    }

    #[test]
    fn test_column_value_parsing() {
        // ---
        assert_eq!(
            Column::TempMax.parse_value(&json!(31.5)).unwrap(),
            ColumnValue::Number(31.5)
        );
        assert_eq!(
            Column::TempMax.parse_value(&json!("31.5")).unwrap(),
            ColumnValue::Number(31.5)
        );
        assert_eq!(
            Column::Date.parse_value(&json!("2021-03-04")).unwrap(),
            ColumnValue::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap())
        );
        assert!(Column::Municipality.parse_value(&json!(3)).is_err());
        assert!(Column::Latitude.parse_value(&json!("north")).is_err());
        assert!(Column::Date.parse_value(&json!("04/03/2021")).is_err());
    }

    #[test]
    fn test_set_overwrites_single_column() {
        // ---
        let mut row = raw();
        row.set(Column::TempAvg, &ColumnValue::Number(22.5)).unwrap();
        assert_eq!(row.temp_avg, Some(22.5));
        assert_eq!(row.temp_max, Some(28.0));

        let err = row.set(Column::Department, &ColumnValue::Number(1.0));
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_column_names_follow_table_order() {
        // ---
        let names: Vec<_> = Column::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "date",
                "station_code",
                "municipality",
                "department",
                "latitude",
                "longitude",
                "temp_min",
                "temp_avg",
                "temp_max"
            ]
        );
    }

    #[test]
    fn test_new_observation_becomes_complete_raw_row() {
        // ---
        let new = NewObservation {
            date: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
            station_code: "X1".into(),
            municipality: "CALI".into(),
            department: "VALLE DEL CAUCA".into(),
            latitude: 3.45,
            longitude: -76.53,
            temp_min: 18.0,
            temp_avg: 24.0,
            temp_max: 31.0,
        };
        let raw: RawObservation = new.into();
        assert_eq!(raw.date, "2019-12-31");
        assert_eq!(raw.temp_avg, Some(24.0));
    }
}
