//! CRUD console endpoints over the temperature table.
//!
//! Reads go straight to the data source. Mutations do not touch the
//! dashboard snapshot; `POST /api/refresh` reloads it explicitly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::models::{Column, NewObservation, RawObservation};
use crate::state::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/observations", get(list).post(create))
        .route(
            "/api/observations/{station_code}",
            patch(update).delete(remove),
        )
        .route("/api/refresh", post(refresh))
}

/// Outcome of a mutation, shown as text in the console.
#[derive(Debug, Serialize)]
struct MutationResponse {
    message: String,
    rows_affected: u64,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    message: String,
    observations: usize,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    column: Column,
    value: serde_json::Value,
}

/// Handle `GET /api/observations`: the whole table, freshly read.
async fn list(State(state): State<AppState>) -> Result<Json<Vec<RawObservation>>, AppError> {
    // ---
    let rows = state.source.fetch_all().await?;
    info!("GET /api/observations - {} rows", rows.len());
    Ok(Json(rows))
}

/// Handle `POST /api/observations`.
async fn create(
    State(state): State<AppState>,
    Json(row): Json<NewObservation>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    let rows_affected = state.source.insert(&row).await?;
    info!("Inserted observation for station {}", row.station_code);
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            message: format!("Inserted {rows_affected} row(s) for station {}", row.station_code),
            rows_affected,
        }),
    ))
}

/// Handle `PATCH /api/observations/{station_code}`.
async fn update(
    State(state): State<AppState>,
    Path(station_code): Path<String>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    // ---
    let value = request.column.parse_value(&request.value)?;
    let rows_affected = state
        .source
        .update(&station_code, request.column, &value)
        .await?;
    info!(
        "Updated {} on {} row(s) of station {}",
        request.column.name(),
        rows_affected,
        station_code
    );
    Ok(Json(MutationResponse {
        message: format!(
            "Updated {} on {rows_affected} row(s) for station {station_code}",
            request.column.name()
        ),
        rows_affected,
    }))
}

/// Handle `DELETE /api/observations/{station_code}`.
async fn remove(
    State(state): State<AppState>,
    Path(station_code): Path<String>,
) -> Result<Json<MutationResponse>, AppError> {
    // ---
    let rows_affected = state.source.delete(&station_code).await?;
    info!("Deleted {} row(s) of station {}", rows_affected, station_code);
    Ok(Json(MutationResponse {
        message: format!("Deleted {rows_affected} row(s) for station {station_code}"),
        rows_affected,
    }))
}

/// Handle `POST /api/refresh`: reload the dashboard snapshot.
async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    // ---
    let observations = state.refresh().await?;
    Ok(Json(RefreshResponse {
        message: format!("Reloaded {observations} observations"),
        observations,
    }))
}
