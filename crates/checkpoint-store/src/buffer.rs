use crate::{db::CheckpointsDb, error::CheckpointError};
use checkpoint_model::{TableCheckpointDiff, TableCheckpointMerger};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Pending diffs of every table with unsaved progress.
///
/// Merges for different tables proceed in parallel; merges for one table
/// are serialized by that table's mutex. Draining takes the outer write lock,
/// so no merge can land between the drain and the flush that follows it.
#[derive(Default)]
pub struct DiffBuffer {
    tables: RwLock<HashMap<String, Mutex<TableCheckpointDiff>>>,
}

impl DiffBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn merge(&self, table_name: &str, merger: &dyn TableCheckpointMerger) {
        {
            let tables = self.tables.read().await;
            if let Some(diff) = tables.get(table_name) {
                merger.merge_into(&mut *diff.lock().await);
                return;
            }
        }

        let mut tables = self.tables.write().await;
        let diff = tables
            .entry(table_name.to_string())
            .or_insert_with(|| Mutex::new(TableCheckpointDiff::new()));
        merger.merge_into(diff.get_mut());
    }

    /// Number of tables with pending progress.
    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }

    /// Drains every non-empty pending diff.
    pub async fn take(&self) -> HashMap<String, TableCheckpointDiff> {
        let drained = std::mem::take(&mut *self.tables.write().await);
        drained
            .into_iter()
            .map(|(name, diff)| (name, diff.into_inner()))
            .filter(|(_, diff)| !diff.is_empty())
            .collect()
    }

    /// Drains the buffer into one `update` call. On failure the drained
    /// diffs are dropped; callers treat the error as fatal for the run.
    pub async fn flush(&self, db: &dyn CheckpointsDb) -> Result<usize, CheckpointError> {
        let diffs = self.take().await;
        if diffs.is_empty() {
            return Ok(0);
        }
        db.update(&diffs).await?;
        debug!(tables = diffs.len(), "Flushed checkpoint diffs");
        Ok(diffs.len())
    }
}
