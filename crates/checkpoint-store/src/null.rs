use crate::{db::CheckpointsDb, error::CheckpointError};
use async_trait::async_trait;
use checkpoint_model::{
    CheckpointStatus, CheckpointTarget, DestroyedTableCheckpoint, EngineCheckpoint,
    TableCheckpoint, TableCheckpointDiff, TableDescriptor, TaskCheckpoint,
};
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};

/// Store used when checkpoints are disabled. Nothing is persisted and every
/// table always looks freshly loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCheckpointsDb;

#[async_trait]
impl CheckpointsDb for NullCheckpointsDb {
    async fn initialize(
        &self,
        _task: &TaskCheckpoint,
        _tables: &[TableDescriptor],
    ) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn task_checkpoint(&self) -> Result<Option<TaskCheckpoint>, CheckpointError> {
        Ok(None)
    }

    async fn get(&self, _table_name: &str) -> Result<TableCheckpoint, CheckpointError> {
        Ok(TableCheckpoint {
            status: CheckpointStatus::LOADED,
            ..Default::default()
        })
    }

    async fn insert_engine_checkpoints(
        &self,
        _table_name: &str,
        _engines: &BTreeMap<i32, EngineCheckpoint>,
    ) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn update(
        &self,
        _diffs: &HashMap<String, TableCheckpointDiff>,
    ) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn remove_checkpoint(&self, _target: &CheckpointTarget) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn ignore_error_checkpoint(
        &self,
        _target: &CheckpointTarget,
    ) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn destroy_error_checkpoint(
        &self,
        _target: &CheckpointTarget,
    ) -> Result<Vec<DestroyedTableCheckpoint>, CheckpointError> {
        Ok(Vec::new())
    }

    async fn dump_tables(&self, _out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn dump_engines(&self, _out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn dump_chunks(&self, _out: &mut (dyn Write + Send)) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn move_checkpoints(&self, _suffix: i64) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}
