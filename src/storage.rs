use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Local, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::constants::{METADATA_FILE, SNAPSHOT_EXTENSION, SNAPSHOT_PREFIX};
use crate::error::{DineSafeError, Result};
use crate::metrics::{SNAPSHOTS_LOADED, SNAPSHOTS_SAVED};
use crate::pipeline::parquet_out::{read_snapshot, write_snapshot};
use crate::pipeline::processing::summary::{unique_establishments, DateSpan};
use crate::types::InspectionTable;

/// Sidecar summary written next to every snapshot. Derived and regenerated
/// in full on each refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub filepath: String,
    /// [rows, columns]
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub date_range: DateSpan,
    pub last_updated: DateTime<Utc>,
    pub unique_establishments: usize,
    pub total_inspections: usize,
}

impl DatasetMetadata {
    pub fn describe(table: &InspectionTable, path: &Path) -> Self {
        Self {
            filepath: path.to_string_lossy().to_string(),
            shape: table.shape(),
            columns: table.columns().iter().map(|c| c.to_string()).collect(),
            date_range: DateSpan::of(table),
            last_updated: Utc::now(),
            unique_establishments: unique_establishments(table),
            total_inspections: table.len(),
        }
    }
}

const PARTIAL_EXTENSION: &str = "tmp";

/// Directory of timestamped Parquet snapshots plus one `metadata.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `dinesafe_data_YYYYmmdd_HHMMSS.parquet` for the current local time.
    pub fn snapshot_filename() -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        format!("{SNAPSHOT_PREFIX}{timestamp}.{SNAPSHOT_EXTENSION}")
    }

    /// Writes a new timestamped snapshot and returns its path.
    pub fn save(&self, table: &InspectionTable) -> Result<PathBuf> {
        self.save_as(table, &Self::snapshot_filename())
    }

    #[instrument(skip(self, table), fields(rows = table.len()))]
    pub fn save_as(&self, table: &InspectionTable, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(filename);

        // Only a complete file ever carries the snapshot extension
        let partial = self.data_dir.join(format!(".{filename}.{PARTIAL_EXTENSION}"));
        if let Err(e) = write_snapshot(table, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::rename(&partial, &path)?;

        counter!(SNAPSHOTS_SAVED).increment(1);
        info!("Data saved to: {}", path.display());
        info!("Shape: {:?}", table.shape());
        Ok(path)
    }

    /// Writes the sidecar for the snapshot at `path`, replacing any previous one.
    pub fn save_metadata(&self, table: &InspectionTable, path: &Path) -> Result<DatasetMetadata> {
        let metadata = DatasetMetadata::describe(table, path);
        let dir = path.parent().unwrap_or(self.data_dir.as_path());
        fs::create_dir_all(dir)?;
        let metadata_path = dir.join(METADATA_FILE);
        fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        info!("Metadata saved to: {}", metadata_path.display());
        Ok(metadata)
    }

    /// Reads the sidecar, if one has been written.
    pub fn load_metadata(&self) -> Result<Option<DatasetMetadata>> {
        let metadata_path = self.data_dir.join(METADATA_FILE);
        if !metadata_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&metadata_path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Path of the most recently modified snapshot. Equal modification times
    /// resolve to the lexicographically greatest file name.
    pub fn latest_snapshot_path(&self) -> Result<PathBuf> {
        if !self.data_dir.is_dir() {
            return Err(DineSafeError::NotFound(format!(
                "No data directory found at {}. Run a refresh first.",
                self.data_dir.display()
            )));
        }

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let modified = fs::metadata(&path)?.modified()?;
            let newer = match &latest {
                None => true,
                Some((best_time, best_path)) => {
                    (modified, path.file_name()) > (*best_time, best_path.file_name())
                }
            };
            if newer {
                latest = Some((modified, path));
            }
        }

        latest.map(|(_, path)| path).ok_or_else(|| {
            DineSafeError::NotFound(format!(
                "No {} files found in {}",
                SNAPSHOT_EXTENSION,
                self.data_dir.display()
            ))
        })
    }

    /// Loads the most recent snapshot.
    #[instrument(skip(self))]
    pub fn load_latest(&self) -> Result<InspectionTable> {
        let path = self.latest_snapshot_path()?;
        let table = read_snapshot(&path)?;

        counter!(SNAPSHOTS_LOADED).increment(1);
        info!("Loaded data from: {}", path.display());
        debug!("Shape: {:?}", table.shape());
        Ok(table)
    }
}

/// Memoizes [`SnapshotStore::load_latest`] for a fixed window. Results may be
/// stale by up to `ttl`.
pub struct CachedSnapshotLoader {
    store: SnapshotStore,
    ttl: Duration,
    cached: Option<(Instant, Arc<InspectionTable>)>,
}

impl CachedSnapshotLoader {
    pub fn new(store: SnapshotStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cached: None,
        }
    }

    pub fn load(&mut self) -> Result<Arc<InspectionTable>> {
        if let Some((loaded_at, table)) = &self.cached {
            if loaded_at.elapsed() < self.ttl {
                debug!("Serving cached snapshot loaded {:?} ago", loaded_at.elapsed());
                return Ok(Arc::clone(table));
            }
        }

        let table = Arc::new(self.store.load_latest()?);
        self.cached = Some((Instant::now(), Arc::clone(&table)));
        Ok(table)
    }

    /// Drops the memoized table so the next load reads storage.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }
}
