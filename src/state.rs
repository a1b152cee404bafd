//! Shared application state: configuration, data source and the current
//! dataset snapshot.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::Result;
use crate::normalize::NormalizedDataset;
use crate::source::{load_snapshot, DataSource};

/// Cloned into every handler. The snapshot is swapped whole on refresh;
/// readers keep the `Arc` they took, so a request never sees a half-loaded
/// table.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<DataSource>,
    snapshot: Arc<RwLock<Arc<NormalizedDataset>>>,
}

impl AppState {
    pub fn new(config: Config, source: DataSource, dataset: NormalizedDataset) -> Self {
        // ---
        AppState {
            config: Arc::new(config),
            source: Arc::new(source),
            snapshot: Arc::new(RwLock::new(Arc::new(dataset))),
        }
    }

    /// The dataset as of the last successful load.
    pub async fn snapshot(&self) -> Arc<NormalizedDataset> {
        self.snapshot.read().await.clone()
    }

    /// Re-query the source and replace the snapshot.
    ///
    /// On failure the previous snapshot stays in place. Returns the number of
    /// observations now loaded.
    pub async fn refresh(&self) -> Result<usize> {
        // ---
        let dataset = load_snapshot(&self.source).await?;
        let count = dataset.len();
        *self.snapshot.write().await = Arc::new(dataset);
        tracing::info!("Snapshot refreshed with {} observations", count);
        Ok(count)
    }
}
