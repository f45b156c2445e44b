use crate::error::CheckpointError;
use async_trait::async_trait;
use checkpoint_model::{
    CheckpointTarget, DestroyedTableCheckpoint, EngineCheckpoint, TableCheckpoint,
    TableCheckpointDiff, TableDescriptor, TaskCheckpoint,
};
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};

/// Durable store of import progress.
///
/// Every operation runs as one atomic unit in the backing store: either all
/// of its writes become visible or none do.
#[async_trait]
pub trait CheckpointsDb: Send + Sync {
    /// Creates the checkpoint relations when missing, records the task and
    /// registers each table with status `Loaded`. Tables already registered
    /// with the same table info are left untouched.
    async fn initialize(
        &self,
        task: &TaskCheckpoint,
        tables: &[TableDescriptor],
    ) -> Result<(), CheckpointError>;

    async fn task_checkpoint(&self) -> Result<Option<TaskCheckpoint>, CheckpointError>;

    /// Loads the full checkpoint of one table, keyed by its unique name.
    async fn get(&self, table_name: &str) -> Result<TableCheckpoint, CheckpointError>;

    async fn insert_engine_checkpoints(
        &self,
        table_name: &str,
        engines: &BTreeMap<i32, EngineCheckpoint>,
    ) -> Result<(), CheckpointError>;

    /// Applies accumulated diffs of any number of tables.
    async fn update(
        &self,
        diffs: &HashMap<String, TableCheckpointDiff>,
    ) -> Result<(), CheckpointError>;

    async fn remove_checkpoint(&self, target: &CheckpointTarget) -> Result<(), CheckpointError>;

    /// Resets failed tables and engines back to `Loaded`.
    async fn ignore_error_checkpoint(
        &self,
        target: &CheckpointTarget,
    ) -> Result<(), CheckpointError>;

    /// Deletes every checkpoint row of failed tables and reports the engine
    /// id range each of them used.
    async fn destroy_error_checkpoint(
        &self,
        target: &CheckpointTarget,
    ) -> Result<Vec<DestroyedTableCheckpoint>, CheckpointError>;

    async fn dump_tables(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError>;

    async fn dump_engines(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError>;

    async fn dump_chunks(&self, out: &mut (dyn Write + Send)) -> Result<(), CheckpointError>;

    /// Moves all checkpoint relations to a backup named after `suffix`,
    /// leaving the active store empty.
    async fn move_checkpoints(&self, suffix: i64) -> Result<(), CheckpointError>;

    async fn close(&self) -> Result<(), CheckpointError>;
}
