//! Dashboard endpoints: control options and the evolution chart.
//!
//! Every control change on the front end maps to one of these requests,
//! each answered from the in-memory snapshot without touching the source.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{aggregate, DateWindow, PeriodKind};
use crate::chart::{ChartSpec, ChartSubject};
use crate::error::AppError;
use crate::models::Variable;
use crate::selector::{daily_series_in, municipality_choices, MunicipalityChoices};
use crate::state::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/controls", get(controls))
        .route("/api/municipalities", get(municipalities))
        .route("/api/evolution", get(evolution))
}

#[derive(Debug, Serialize)]
struct Choice<T> {
    value: T,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct ControlsResponse {
    departments: Vec<String>,
    default_department: Option<String>,
    aggregation_levels: Vec<Choice<PeriodKind>>,
    default_period: PeriodKind,
    variables: Vec<Choice<Variable>>,
    default_variable: Variable,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    default_start_date: NaiveDate,
    default_end_date: NaiveDate,
}

/// Handle `GET /api/controls`: everything needed to draw the controls.
async fn controls(State(state): State<AppState>) -> Json<ControlsResponse> {
    // ---
    let dataset = state.snapshot().await;
    let departments = dataset.departments();
    let default_department = departments
        .iter()
        .find(|d| **d == state.config.default_department)
        .or_else(|| departments.first())
        .cloned();
    let bounds = dataset.date_bounds();
    let default_start_date = state.config.default_start_date;

    Json(ControlsResponse {
        default_department,
        departments,
        aggregation_levels: PeriodKind::SELECTABLE
            .iter()
            .map(|&p| Choice {
                value: p,
                label: p.rule().adjective,
            })
            .collect(),
        default_period: PeriodKind::Month,
        variables: Variable::ALL
            .iter()
            .map(|&v| Choice {
                value: v,
                label: v.label(),
            })
            .collect(),
        default_variable: Variable::TempMax,
        min_date: bounds.map(|(min, _)| min),
        max_date: bounds.map(|(_, max)| max),
        default_start_date,
        default_end_date: bounds.map_or(default_start_date, |(_, max)| max),
    })
}

#[derive(Debug, Deserialize)]
struct MunicipalitiesQuery {
    department: String,
}

/// Handle `GET /api/municipalities?department=`.
async fn municipalities(
    Query(params): Query<MunicipalitiesQuery>,
    State(state): State<AppState>,
) -> Json<MunicipalityChoices> {
    // ---
    let dataset = state.snapshot().await;
    Json(municipality_choices(
        &dataset,
        params.department.trim(),
        &state.config.default_municipality,
    ))
}

/// Query parameters of the evolution chart.
#[derive(Debug, Deserialize)]
struct EvolutionQuery {
    #[serde(default)]
    period: Option<PeriodKind>,
    department: String,
    municipality: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    variable: Option<Variable>,
}

/// Handle `GET /api/evolution`: run Selector + Aggregator and answer with
/// the chart specification. An empty result is a normal answer.
async fn evolution(
    Query(params): Query<EvolutionQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    // ---
    info!("GET /api/evolution - {:?}", params);
    let dataset = state.snapshot().await;

    let start = match &params.start_date {
        Some(s) => s.clone(),
        None => state.config.default_start_date.format("%Y-%m-%d").to_string(),
    };
    let end = match &params.end_date {
        Some(s) => s.clone(),
        None => dataset
            .date_bounds()
            .map_or(state.config.default_start_date, |(_, max)| max)
            .format("%Y-%m-%d")
            .to_string(),
    };
    let window = DateWindow::parse(&start, &end)?;
    let period = params.period.unwrap_or(PeriodKind::Month);
    let variable = params.variable.unwrap_or(Variable::TempMax);
    let department = params.department.trim();
    let municipality = params.municipality.trim();

    debug!("GET /api/evolution - Step 1: select");
    let series = daily_series_in(&dataset, department, municipality);

    debug!("GET /api/evolution - Step 2: aggregate {} days", series.len());
    let evolution = aggregate(&series, period, &window, variable);

    let subject = ChartSubject {
        department,
        municipality,
    };
    let spec = ChartSpec::build(subject, &window, &evolution);
    debug!(
        "GET /api/evolution - Returning {} frames (empty: {})",
        evolution.frames.len(),
        spec.empty
    );
    Ok(Json(spec).into_response())
}
