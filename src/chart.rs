//! Chart payload handed to the front end.
//!
//! The front end draws an animated scatter plot keyed by period date; this
//! module only decides what it is told: title, axes, frames and playback.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{DateWindow, Evolution, Frame, PeriodKind};
use crate::models::Variable;

/// Delay per animation frame while playing.
pub const FRAME_DURATION_MS: u64 = 50;

/// Delay before the front end auto-starts playback after the first render.
pub const AUTOPLAY_DELAY_MS: u64 = 1000;

/// Who the chart is about.
#[derive(Debug, Clone, Copy)]
pub struct ChartSubject<'a> {
    pub department: &'a str,
    pub municipality: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Axis {
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick0: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct Playback {
    pub frame_duration_ms: u64,
    pub redraw: bool,
    pub autoplay_delay_ms: u64,
}

/// Everything the front end needs to render one evolution chart.
#[derive(Debug, Serialize)]
pub struct ChartSpec<'a> {
    pub title: String,
    pub period: PeriodKind,
    pub variable: Variable,
    pub empty: bool,
    pub label: &'a str,
    pub dropped_out_of_range: usize,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub playback: Playback,
    pub frames: Vec<Frame<'a>>,
}

/// First letter upper case, the rest lower case.
pub fn capitalize(s: &str) -> String {
    // ---
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Chart title for an evolution, including the "no data" wording.
pub fn title(subject: ChartSubject<'_>, window: &DateWindow, evolution: &Evolution) -> String {
    // ---
    let place = format!(
        "{}, {}",
        capitalize(subject.municipality),
        capitalize(subject.department)
    );
    if evolution.is_empty() {
        format!(
            "Sin datos disponibles para {} entre {} y {}",
            place,
            window.min_text(),
            evolution.label
        )
    } else {
        format!(
            "Evolución de promedio de {}(°C) {} de {} entre {} y {}",
            evolution.variable.label(),
            evolution.period.rule().adjective,
            place,
            window.min_text(),
            evolution.label
        )
    }
}

impl<'a> ChartSpec<'a> {
    pub fn build(subject: ChartSubject<'_>, window: &DateWindow, evolution: &'a Evolution) -> Self {
        // ---
        let rule = evolution.period.rule();
        let first = evolution.frames.points().first().map(|p| p.date);

        ChartSpec {
            title: title(subject, window, evolution),
            period: evolution.period,
            variable: evolution.variable,
            empty: evolution.is_empty(),
            label: &evolution.label,
            dropped_out_of_range: evolution.dropped_out_of_range,
            x_axis: Axis {
                title: "Fecha",
                tick_format: Some(rule.tick_format),
                tick_step: rule.tick_step,
                tick0: rule.tick_step.and(first),
            },
            y_axis: Axis {
                title: "°C",
                tick_format: None,
                tick_step: None,
                tick0: None,
            },
            playback: Playback {
                frame_duration_ms: FRAME_DURATION_MS,
                redraw: true,
                autoplay_delay_ms: AUTOPLAY_DELAY_MS,
            },
            frames: evolution.frames.iter().collect(),
        }
    }
}
