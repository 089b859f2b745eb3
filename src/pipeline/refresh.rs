use std::path::PathBuf;
use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::apis::ckan::CkanClient;
use crate::error::Result;
use crate::metrics::REFRESH_DURATION;
use crate::pipeline::processing::normalize::normalize;
use crate::storage::{DatasetMetadata, SnapshotStore};

/// Result of a complete refresh run
#[derive(Debug, Serialize)]
pub struct RefreshResult {
    pub rows: usize,
    pub path: PathBuf,
    pub metadata: DatasetMetadata,
}

pub struct Pipeline;

impl Pipeline {
    /// Fetches the package, normalizes it and persists a new snapshot with its
    /// metadata sidecar. Nothing is written unless fetch and normalize both
    /// succeed.
    #[instrument(skip(client, store))]
    pub async fn refresh(client: &CkanClient, store: &SnapshotStore, package_id: &str) -> Result<RefreshResult> {
        let start = Instant::now();
        info!("Starting refresh of package {} from {}", package_id, client.base_url());

        let outcome = Self::run(client, store, package_id).await;
        let elapsed = start.elapsed().as_secs_f64();
        histogram!(REFRESH_DURATION).record(elapsed);

        match &outcome {
            Ok(result) => info!(
                "Refresh finished in {:.2}s: {} rows saved to {}",
                elapsed,
                result.rows,
                result.path.display()
            ),
            Err(e) => error!("Refresh failed after {:.2}s: {}", elapsed, e),
        }
        outcome
    }

    async fn run(client: &CkanClient, store: &SnapshotStore, package_id: &str) -> Result<RefreshResult> {
        let raw = client.fetch_package(package_id).await?;
        let table = normalize(&raw)?;
        let path = store.save(&table)?;
        let metadata = store.save_metadata(&table, &path)?;

        Ok(RefreshResult {
            rows: table.len(),
            path,
            metadata,
        })
    }
}
