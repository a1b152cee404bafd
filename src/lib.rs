//! Historical temperature evolution for Colombian municipalities.
//!
//! The pipeline runs leaves first: a [`source::DataSource`] returns the raw
//! table, [`normalize`] cleans it into an immutable snapshot, [`selector`]
//! extracts one municipality's daily series and [`aggregate`] resamples it
//! into period buckets and cumulative animation frames. [`chart`] turns the
//! result into the payload served by [`routes`].

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod schema;
pub mod selector;
pub mod source;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
