//! In-process table, for offline runs and tests.

use std::path::Path;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Column, ColumnValue, NewObservation, RawObservation};

#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: RwLock<Vec<RawObservation>>,
}

impl MemoryTable {
    pub fn new(rows: Vec<RawObservation>) -> Self {
        MemoryTable {
            rows: RwLock::new(rows),
        }
    }

    /// Seed the table from a JSON array of rows.
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        // ---
        let text = std::fs::read_to_string(path)?;
        let rows: Vec<RawObservation> = serde_json::from_str(&text)?;
        tracing::debug!("seeded {} rows from {}", rows.len(), path.display());
        Ok(Self::new(rows))
    }

    pub async fn fetch_all(&self) -> Result<Vec<RawObservation>> {
        Ok(self.rows.read().await.clone())
    }

    pub async fn insert(&self, row: &NewObservation) -> Result<u64> {
        // ---
        self.rows.write().await.push(row.clone().into());
        Ok(1)
    }

    pub async fn update(&self, station_code: &str, column: Column, value: &ColumnValue) -> Result<u64> {
        // ---
        let mut rows = self.rows.write().await;
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| r.station_code == station_code) {
            row.set(column, value)?;
            affected += 1;
        }
        Ok(affected)
    }

    pub async fn delete(&self, station_code: &str) -> Result<u64> {
        // ---
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| r.station_code != station_code);
        Ok((before - rows.len()) as u64)
    }
}
