//! Flat records of the four checkpoint relations.
//!
//! Both backends read and write these rows; `get` joins them back into a
//! [`TableCheckpoint`] and the dump utilities print them as CSV.

use crate::error::CheckpointError;
use checkpoint_model::{
    ChunkCheckpoint, ChunkCheckpointKey, CheckpointStatus, EngineCheckpoint, KvChecksum,
    TableCheckpoint, TableDescriptor, TableInfo, TaskCheckpoint,
    diff::ChunkCheckpointDiff,
    source::{Chunk, Compression, SourceFileMeta, SourceType},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub task: TaskCheckpoint,
    pub create_time: i64,
    pub update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub task_id: i64,
    pub table_name: String,
    pub hash: Vec<u8>,
    pub status: u8,
    pub table_id: i64,
    pub table_info: Vec<u8>,
    pub kv_bytes: u64,
    pub kv_kvs: u64,
    pub kv_checksum: u64,
    pub auto_rand_base: i64,
    pub auto_incr_base: i64,
    pub auto_row_id_base: i64,
    pub create_time: i64,
    pub update_time: i64,
}

impl TableRow {
    pub fn new(task_id: i64, table: &TableDescriptor, now: i64) -> Result<Self, CheckpointError> {
        let (table_info, hash) = table.encoded_info()?;
        Ok(Self {
            task_id,
            table_name: table.unique_name(),
            hash: hash.to_vec(),
            status: CheckpointStatus::LOADED.code(),
            table_id: table.id,
            table_info,
            kv_bytes: 0,
            kv_kvs: 0,
            kv_checksum: 0,
            auto_rand_base: 0,
            auto_incr_base: 0,
            auto_row_id_base: 0,
            create_time: now,
            update_time: now,
        })
    }

    pub fn status(&self) -> Result<CheckpointStatus, CheckpointError> {
        CheckpointStatus::from_code(self.status)
            .map_err(|e| CheckpointError::from_model(&self.table_name, e))
    }

    pub fn checksum(&self) -> KvChecksum {
        KvChecksum::new(self.kv_bytes, self.kv_kvs, self.kv_checksum)
    }

    pub fn set_checksum(&mut self, checksum: KvChecksum) {
        self.kv_bytes = checksum.bytes;
        self.kv_kvs = checksum.kvs;
        self.kv_checksum = checksum.checksum;
    }

    pub fn csv_record(&self) -> Vec<String> {
        vec![
            self.task_id.to_string(),
            self.table_name.clone(),
            hex(&self.hash),
            self.status.to_string(),
            format_time(self.create_time),
            format_time(self.update_time),
            self.auto_rand_base.to_string(),
            self.auto_incr_base.to_string(),
            self.auto_row_id_base.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRow {
    pub table_name: String,
    pub engine_id: i32,
    pub status: u8,
    pub create_time: i64,
    pub update_time: i64,
}

impl EngineRow {
    pub fn status(&self) -> Result<CheckpointStatus, CheckpointError> {
        CheckpointStatus::from_code(self.status)
            .map_err(|e| CheckpointError::from_model(&self.table_name, e))
    }

    pub fn csv_record(&self) -> Vec<String> {
        vec![
            self.table_name.clone(),
            self.engine_id.to_string(),
            self.status.to_string(),
            format_time(self.create_time),
            format_time(self.update_time),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRow {
    pub table_name: String,
    pub engine_id: i32,
    pub path: String,
    pub offset: i64,
    pub source_type: i32,
    pub compression: i32,
    pub sort_key: String,
    pub file_size: i64,
    /// JSON encoded column permutation, `null` when absent.
    pub columns: String,
    pub pos: i64,
    pub real_pos: i64,
    pub end_offset: i64,
    pub prev_rowid_max: i64,
    pub rowid_max: i64,
    pub kvc_bytes: u64,
    pub kvc_kvs: u64,
    pub kvc_checksum: u64,
    pub create_time: i64,
    pub update_time: i64,
}

impl ChunkRow {
    pub fn new(
        table_name: &str,
        engine_id: i32,
        chunk: &ChunkCheckpoint,
        now: i64,
    ) -> Result<Self, CheckpointError> {
        Ok(Self {
            table_name: table_name.to_string(),
            engine_id,
            path: chunk.key.path.clone(),
            offset: chunk.key.offset,
            source_type: chunk.file_meta.source_type.code(),
            compression: chunk.file_meta.compression.code(),
            sort_key: chunk.file_meta.sort_key.clone(),
            file_size: chunk.file_meta.file_size,
            columns: serde_json::to_string(&chunk.column_permutation)?,
            pos: chunk.chunk.offset,
            real_pos: chunk.chunk.real_offset,
            end_offset: chunk.chunk.end_offset,
            prev_rowid_max: chunk.chunk.prev_row_id_max,
            rowid_max: chunk.chunk.row_id_max,
            kvc_bytes: chunk.checksum.bytes,
            kvc_kvs: chunk.checksum.kvs,
            kvc_checksum: chunk.checksum.checksum,
            create_time: chunk.timestamp,
            update_time: now,
        })
    }

    pub fn key(&self) -> ChunkCheckpointKey {
        ChunkCheckpointKey::new(self.path.clone(), self.offset)
    }

    pub fn apply(&mut self, diff: &ChunkCheckpointDiff, now: i64) -> Result<(), CheckpointError> {
        self.pos = diff.pos;
        self.real_pos = diff.real_pos;
        self.prev_rowid_max = diff.row_id;
        self.kvc_bytes = diff.checksum.bytes;
        self.kvc_kvs = diff.checksum.kvs;
        self.kvc_checksum = diff.checksum.checksum;
        self.columns = serde_json::to_string(&diff.column_permutation)?;
        self.update_time = now;
        Ok(())
    }

    pub fn to_checkpoint(&self) -> Result<ChunkCheckpoint, CheckpointError> {
        let source_type = SourceType::try_from(self.source_type)
            .map_err(|e| CheckpointError::from_model(&self.table_name, e))?;
        let compression = Compression::try_from(self.compression)
            .map_err(|e| CheckpointError::from_model(&self.table_name, e))?;
        let column_permutation: Option<Vec<i32>> = serde_json::from_str(&self.columns)
            .map_err(|e| {
                CheckpointError::inconsistent(
                    &self.table_name,
                    format!("invalid column permutation of {}: {e}", self.key()),
                )
            })?;

        Ok(ChunkCheckpoint {
            key: self.key(),
            file_meta: SourceFileMeta {
                path: self.path.clone(),
                source_type,
                compression,
                sort_key: self.sort_key.clone(),
                file_size: self.file_size,
            },
            column_permutation,
            chunk: Chunk {
                offset: self.pos,
                real_offset: self.real_pos,
                end_offset: self.end_offset,
                prev_row_id_max: self.prev_rowid_max,
                row_id_max: self.rowid_max,
            },
            checksum: KvChecksum::new(self.kvc_bytes, self.kvc_kvs, self.kvc_checksum),
            timestamp: self.create_time,
        })
    }

    pub fn csv_record(&self) -> Vec<String> {
        vec![
            self.table_name.clone(),
            self.path.clone(),
            self.offset.to_string(),
            self.source_type.to_string(),
            self.compression.to_string(),
            self.sort_key.clone(),
            self.file_size.to_string(),
            self.columns.clone(),
            self.pos.to_string(),
            self.real_pos.to_string(),
            self.end_offset.to_string(),
            self.prev_rowid_max.to_string(),
            self.rowid_max.to_string(),
            self.kvc_bytes.to_string(),
            self.kvc_kvs.to_string(),
            self.kvc_checksum.to_string(),
            format_time(self.create_time),
            format_time(self.update_time),
        ]
    }
}

/// Rows of one table's engines, built for `insert_engine_checkpoints`.
pub(crate) fn engine_rows(
    table_name: &str,
    engines: &BTreeMap<i32, EngineCheckpoint>,
    now: i64,
) -> Result<(Vec<EngineRow>, Vec<ChunkRow>), CheckpointError> {
    let mut engine_rows = Vec::with_capacity(engines.len());
    let mut chunk_rows = Vec::new();
    for (engine_id, engine) in engines {
        engine_rows.push(EngineRow {
            table_name: table_name.to_string(),
            engine_id: *engine_id,
            status: engine.status.code(),
            create_time: now,
            update_time: now,
        });
        for chunk in &engine.chunks {
            chunk_rows.push(ChunkRow::new(table_name, *engine_id, chunk, now)?);
        }
    }
    Ok((engine_rows, chunk_rows))
}

/// Joins the rows read for one table into its checkpoint. Chunks are
/// expected in processing order and are grouped by engine id; chunks of an
/// engine without an engine row are dropped.
pub(crate) fn assemble(
    table: TableRow,
    engines: Vec<EngineRow>,
    chunks: Vec<ChunkRow>,
) -> Result<TableCheckpoint, CheckpointError> {
    let mut cp = TableCheckpoint {
        status: table.status()?,
        table_id: table.table_id,
        table_info: TableInfo::from_bytes(&table.table_info).map_err(|e| {
            CheckpointError::inconsistent(&table.table_name, format!("invalid table info: {e}"))
        })?,
        auto_rand_base: table.auto_rand_base,
        auto_incr_base: table.auto_incr_base,
        auto_row_id_base: table.auto_row_id_base,
        engines: BTreeMap::new(),
        checksum: table.checksum(),
    };

    for engine in &engines {
        cp.engines
            .insert(engine.engine_id, EngineCheckpoint::new(engine.status()?));
    }
    for chunk in &chunks {
        if let Some(engine) = cp.engines.get_mut(&chunk.engine_id) {
            engine.chunks.push(chunk.to_checkpoint()?);
        }
    }

    Ok(cp)
}

/// Formats unix seconds the way the dumps print timestamps,
/// e.g. `2019-04-18 02:45:55 +0000 UTC`.
pub(crate) fn format_time(secs: i64) -> String {
    match chrono::DateTime::from_timestamp(secs, 0) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S %z UTC").to_string(),
        None => secs.to_string(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
