//! Data source adapters and the CRUD gateway over the temperature table.
//!
//! Every backend offers the same four operations: bulk read, insert of one
//! full row, single-column update by station code, and delete by station
//! code. Values always travel as bound parameters; only the validated table
//! name and the fixed [`Column`] identifiers appear in statement text.

use crate::config::{Backend, Config};
use crate::error::Result;
use crate::models::{Column, ColumnValue, NewObservation, RawObservation};
use crate::normalize::{normalize, NormalizedDataset};

mod memory;
mod postgres;
mod warehouse;

pub use memory::MemoryTable;
pub use postgres::PgTable;
pub use warehouse::WarehouseClient;

/// The configured backend holding the temperature table.
pub enum DataSource {
    Warehouse(WarehouseClient),
    Postgres(PgTable),
    Memory(MemoryTable),
}

impl DataSource {
    /// Build the backend selected in `config`, connecting where needed.
    pub async fn connect(config: &Config) -> Result<Self> {
        // ---
        let source = match &config.backend {
            Backend::Warehouse(w) => DataSource::Warehouse(WarehouseClient::new(w, &config.table)?),
            Backend::Postgres {
                db_url,
                db_pool_max,
            } => DataSource::Postgres(PgTable::connect(db_url, *db_pool_max, &config.table).await?),
            Backend::Memory { seed_file } => DataSource::Memory(match seed_file {
                Some(path) => MemoryTable::from_seed_file(path)?,
                None => MemoryTable::default(),
            }),
        };
        tracing::info!("Using {} data source", source.describe());
        Ok(source)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DataSource::Warehouse(_) => "warehouse",
            DataSource::Postgres(_) => "postgres",
            DataSource::Memory(_) => "memory",
        }
    }

    /// Read the whole table.
    pub async fn fetch_all(&self) -> Result<Vec<RawObservation>> {
        match self {
            DataSource::Warehouse(w) => w.fetch_all().await,
            DataSource::Postgres(p) => p.fetch_all().await,
            DataSource::Memory(m) => m.fetch_all().await,
        }
    }

    /// Insert one fully specified row. Returns affected rows.
    pub async fn insert(&self, row: &NewObservation) -> Result<u64> {
        match self {
            DataSource::Warehouse(w) => w.insert(row).await,
            DataSource::Postgres(p) => p.insert(row).await,
            DataSource::Memory(m) => m.insert(row).await,
        }
    }

    /// Set `column` to `value` on every row of `station_code`.
    pub async fn update(
        &self,
        station_code: &str,
        column: Column,
        value: &ColumnValue,
    ) -> Result<u64> {
        match self {
            DataSource::Warehouse(w) => w.update(station_code, column, value).await,
            DataSource::Postgres(p) => p.update(station_code, column, value).await,
            DataSource::Memory(m) => m.update(station_code, column, value).await,
        }
    }

    /// Delete every row of `station_code`.
    pub async fn delete(&self, station_code: &str) -> Result<u64> {
        match self {
            DataSource::Warehouse(w) => w.delete(station_code).await,
            DataSource::Postgres(p) => p.delete(station_code).await,
            DataSource::Memory(m) => m.delete(station_code).await,
        }
    }
}

/// Fetch and normalize a fresh snapshot of the table.
pub async fn load_snapshot(source: &DataSource) -> Result<NormalizedDataset> {
    // ---
    let rows = source.fetch_all().await?;
    tracing::info!("Fetched {} rows from {}", rows.len(), source.describe());
    normalize(rows)
}

/// Column list shared by every statement, in table order.
fn column_list() -> String {
    Column::ALL
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}
