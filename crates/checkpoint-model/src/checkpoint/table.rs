use crate::{
    checkpoint::engine::EngineCheckpoint, checksum::KvChecksum, diff::TableCheckpointDiff,
    naming::unique_table_name, status::CheckpointStatus,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Opaque schema snapshot of a target table, captured once at initialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableInfo(pub serde_json::Value);

impl TableInfo {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }

    /// Decodes a persisted snapshot. Empty payloads mean no snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Option<TableInfo>, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(bytes).map(|v| Some(TableInfo(v)))
    }

    pub fn hash(&self) -> Result<[u8; 32], serde_json::Error> {
        Ok(Sha256::digest(self.to_bytes()?).into())
    }
}

/// A table registered by `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub id: i64,
    pub desired: Option<TableInfo>,
}

impl TableDescriptor {
    pub fn unique_name(&self) -> String {
        unique_table_name(&self.schema, &self.name)
    }

    /// Serialized snapshot and its hash, as stored in the table relation.
    /// Tables without a snapshot store an empty payload and a zero hash.
    pub fn encoded_info(&self) -> Result<(Vec<u8>, [u8; 32]), serde_json::Error> {
        match &self.desired {
            Some(info) => Ok((info.to_bytes()?, info.hash()?)),
            None => Ok((Vec::new(), [0u8; 32])),
        }
    }
}

/// Result of destroying a failed table's checkpoints. The engine id range
/// tells the caller which engine outputs to discard outside the store.
/// Tables without engine rows report `0..=-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyedTableCheckpoint {
    pub table_name: String,
    pub min_engine_id: i32,
    pub max_engine_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCheckpoint {
    pub status: CheckpointStatus,
    /// 0 when the target table id is not known yet.
    pub table_id: i64,
    pub table_info: Option<TableInfo>,
    pub auto_rand_base: i64,
    pub auto_incr_base: i64,
    pub auto_row_id_base: i64,
    pub engines: BTreeMap<i32, EngineCheckpoint>,
    pub checksum: KvChecksum,
}

impl TableCheckpoint {
    pub fn count_chunks(&self) -> usize {
        self.engines.values().map(|e| e.chunks.len()).sum()
    }

    /// Sum of the per-chunk checksums of every engine.
    pub fn chunk_checksum_total(&self) -> KvChecksum {
        self.engines
            .values()
            .flat_map(|e| e.chunks.iter().map(|c| c.checksum))
            .sum()
    }

    /// Applies a pending diff with the same semantics the stores use:
    /// engines and chunks that do not exist are left alone, auto-id bases
    /// only grow.
    pub fn apply(&mut self, diff: &TableCheckpointDiff) {
        for (engine_id, engine_diff) in diff.engines() {
            let Some(engine) = self.engines.get_mut(engine_id) else {
                continue;
            };
            for (key, chunk_diff) in &engine_diff.chunks {
                if let Some(chunk) = engine.chunks.iter_mut().find(|c| &c.key == key) {
                    chunk.chunk.offset = chunk_diff.pos;
                    chunk.chunk.real_offset = chunk_diff.real_pos;
                    chunk.chunk.prev_row_id_max = chunk_diff.row_id;
                    chunk.checksum = chunk_diff.checksum;
                    chunk.column_permutation = chunk_diff.column_permutation.clone();
                }
            }
        }

        if let Some(bases) = diff.rebase() {
            self.auto_rand_base = self.auto_rand_base.max(bases.auto_rand_base);
            self.auto_incr_base = self.auto_incr_base.max(bases.auto_incr_base);
            self.auto_row_id_base = self.auto_row_id_base.max(bases.auto_row_id_base);
        }

        for (engine_id, engine_diff) in diff.engines() {
            if let (Some(status), Some(engine)) =
                (engine_diff.status, self.engines.get_mut(engine_id))
            {
                engine.status = status;
            }
        }

        if let Some(status) = diff.status() {
            self.status = status;
        }
        if let Some(checksum) = diff.checksum() {
            self.checksum = checksum;
        }
    }
}
