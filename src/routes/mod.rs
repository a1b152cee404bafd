use axum::Router;

use crate::state::AppState;

mod dashboard;
mod health;
mod observations;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(observations::router())
        .merge(health::router())
        .with_state(state)
}
