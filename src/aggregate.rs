//! Temporal aggregation of a daily series into period buckets, and the
//! cumulative frames used to reveal those buckets one by one.
//!
//! A single aggregator serves every period kind; what differs between kinds
//! (bucket boundary, tick format, title wording) lives in [`PeriodRule`].

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{TemperatureSums, Temperatures, Variable};
use crate::normalize::parse_timestamp;
use crate::selector::DailyPoint;

/// Lower bound of the plausibility filter, °C inclusive.
pub const PLAUSIBLE_MIN_C: f64 = 0.0;

/// Upper bound of the plausibility filter, °C inclusive.
pub const PLAUSIBLE_MAX_C: f64 = 45.0;

// ---

/// Resampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    #[serde(alias = "W")]
    Week,
    #[serde(alias = "M")]
    Month,
    #[serde(alias = "Q")]
    Quarter,
    #[serde(alias = "A", alias = "Y")]
    Year,
}

/// Per-kind resampling and display rules.
#[derive(Debug)]
pub struct PeriodRule {
    /// Maps a day to the date labelling its bucket.
    pub boundary: fn(NaiveDate) -> Option<NaiveDate>,
    /// strftime-style x-axis tick format for the front end.
    pub tick_format: &'static str,
    /// Tick spacing hint (`M3` = every three months); `None` lets the
    /// front end decide.
    pub tick_step: Option<&'static str>,
    /// Word used in chart titles.
    pub adjective: &'static str,
}

const WEEK: PeriodRule = PeriodRule {
    boundary: week_ending_monday,
    tick_format: "%Y-%m-%d",
    tick_step: Some("M3"),
    adjective: "Semanal",
};

const MONTH: PeriodRule = PeriodRule {
    boundary: end_of_month,
    tick_format: "%Y-%m",
    tick_step: Some("M3"),
    adjective: "Mensual",
};

const QUARTER: PeriodRule = PeriodRule {
    boundary: end_of_quarter,
    tick_format: "%Y-Q%q",
    tick_step: Some("M3"),
    adjective: "Trimestral",
};

const YEAR: PeriodRule = PeriodRule {
    boundary: end_of_year,
    tick_format: "%Y",
    tick_step: None,
    adjective: "Anual",
};

impl PeriodKind {
    /// Kinds offered in the aggregation control. Weekly stays reachable
    /// through the API but is not listed.
    pub const SELECTABLE: [PeriodKind; 3] = [PeriodKind::Month, PeriodKind::Quarter, PeriodKind::Year];

    pub fn rule(self) -> &'static PeriodRule {
        match self {
            PeriodKind::Week => &WEEK,
            PeriodKind::Month => &MONTH,
            PeriodKind::Quarter => &QUARTER,
            PeriodKind::Year => &YEAR,
        }
    }

    pub fn bucket_of(self, date: NaiveDate) -> Option<NaiveDate> {
        (self.rule().boundary)(date)
    }
}

/// Weekly buckets run Tuesday..Monday and are labelled by the Monday.
fn week_ending_monday(date: NaiveDate) -> Option<NaiveDate> {
    // ---
    let ahead = (7 - date.weekday().num_days_from_monday()) % 7;
    date.checked_add_days(Days::new(u64::from(ahead)))
}

fn last_day_of(year: i32, month: u32) -> Option<NaiveDate> {
    // ---
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn end_of_month(date: NaiveDate) -> Option<NaiveDate> {
    last_day_of(date.year(), date.month())
}

fn end_of_quarter(date: NaiveDate) -> Option<NaiveDate> {
    last_day_of(date.year(), date.month0() / 3 * 3 + 3)
}

fn end_of_year(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), 12, 31)
}

// ---

/// Inclusive window requested by the caller.
///
/// Bounds are date-times: a bucket, dated at midnight, is inside when
/// `start <= date <= end`, so `2023-06-30T12:00:00` as start excludes the
/// bucket of June 30th. The caller's text for both ends is kept: when
/// nothing survives the filters, the chart label falls back to the
/// requested end as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    min_text: String,
    max_text: String,
}

impl DateWindow {
    /// Parse a window from request text. An inverted window is accepted and
    /// simply matches nothing.
    pub fn parse(min: &str, max: &str) -> Result<Self> {
        // ---
        let parse = |name: &str, text: &str| {
            parse_timestamp(text)
                .ok_or_else(|| AppError::BadRequest(format!("invalid {name} {text:?}")))
        };
        Ok(DateWindow {
            start: parse("start_date", min)?,
            end: parse("end_date", max)?,
            min_text: min.to_string(),
            max_text: max.to_string(),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let at = date.and_time(NaiveTime::MIN);
        self.start <= at && at <= self.end
    }

    pub fn min_text(&self) -> &str {
        &self.min_text
    }

    pub fn max_text(&self) -> &str {
        &self.max_text
    }
}

// ---

/// One retained period bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub temps: Temperatures,
}

/// Retained buckets in ascending date order. Frame `k` is the prefix
/// `0..=k`; frames borrow the buffer rather than copying it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSequence {
    points: Vec<PeriodPoint>,
}

/// A cumulative prefix of the retained buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frame<'a> {
    #[serde(rename = "frame")]
    pub index: usize,
    pub points: &'a [PeriodPoint],
}

impl FrameSequence {
    /// Number of frames, equal to the number of retained buckets.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PeriodPoint] {
        &self.points
    }

    pub fn frame(&self, index: usize) -> Option<Frame<'_>> {
        // ---
        (index < self.points.len()).then(|| Frame {
            index,
            points: &self.points[..=index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Frame<'_>> + '_ {
        (0..self.points.len()).filter_map(move |i| self.frame(i))
    }
}

/// Result of one aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evolution {
    pub period: PeriodKind,
    pub variable: Variable,
    pub frames: FrameSequence,
    /// Latest retained bucket as `YYYY-MM-DD`, or the requested end date
    /// verbatim when nothing was retained.
    pub label: String,
    /// Buckets inside the window dropped by the plausibility filter.
    pub dropped_out_of_range: usize,
}

impl Evolution {
    /// No bucket survived: the "no data" outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Mean rounded to one decimal, ties to even, as the dashboard's numeric
/// stack rounds.
fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

fn round_temps(t: Temperatures) -> Temperatures {
    // ---
    Temperatures {
        temp_min: t.temp_min.map(round1),
        temp_avg: t.temp_avg.map(round1),
        temp_max: t.temp_max.map(round1),
    }
}

/// Resample `series` to `period`, keep plausible buckets inside `window`,
/// and build the cumulative frame sequence.
///
/// The plausibility filter applies to the rounded bucket mean of
/// `variable`, never to raw daily values. Out-of-range buckets are dropped
/// silently and only counted.
pub fn aggregate(
    series: &[DailyPoint],
    period: PeriodKind,
    window: &DateWindow,
    variable: Variable,
) -> Evolution {
    // ---
    let mut buckets: BTreeMap<NaiveDate, TemperatureSums> = BTreeMap::new();
    for point in series {
        if let Some(end) = period.bucket_of(point.date) {
            buckets.entry(end).or_default().add(&point.temps);
        }
    }

    let mut dropped_out_of_range = 0;
    let points: Vec<PeriodPoint> = buckets
        .into_iter()
        .filter(|(date, _)| window.contains(*date))
        .filter_map(|(date, sums)| {
            let temps = round_temps(sums.mean());
            let value = variable.pick(&temps)?;
            if (PLAUSIBLE_MIN_C..=PLAUSIBLE_MAX_C).contains(&value) {
                Some(PeriodPoint { date, temps })
            } else {
                dropped_out_of_range += 1;
                None
            }
        })
        .collect();

    let label = match points.last() {
        Some(last) => last.date.format("%Y-%m-%d").to_string(),
        None => window.max_text().to_string(),
    };

    tracing::debug!(
        "aggregated {} daily points into {} {:?} buckets ({} implausible)",
        series.len(),
        points.len(),
        period,
        dropped_out_of_range
    );

    Evolution {
        period,
        variable,
        frames: FrameSequence { points },
        label,
        dropped_out_of_range,
    }
}
