//! Write-combining buffer for checkpoint progress.
//!
//! Workers report progress as small merger values; all mergers for a table
//! are folded into one [`TableCheckpointDiff`] which the store flushes in a
//! single transaction.

pub mod merger;

use crate::{
    checkpoint::chunk::ChunkCheckpointKey, checksum::KvChecksum, status::CheckpointStatus,
};
use std::collections::BTreeMap;

/// High-water marks of the auto-generated id allocators of a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoIdBases {
    pub auto_rand_base: i64,
    pub auto_incr_base: i64,
    pub auto_row_id_base: i64,
}

impl AutoIdBases {
    /// Field-wise maximum of two sets of bases.
    pub fn max(self, other: AutoIdBases) -> AutoIdBases {
        AutoIdBases {
            auto_rand_base: self.auto_rand_base.max(other.auto_rand_base),
            auto_incr_base: self.auto_incr_base.max(other.auto_incr_base),
            auto_row_id_base: self.auto_row_id_base.max(other.auto_row_id_base),
        }
    }
}

/// Pending progress of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCheckpointDiff {
    pub pos: i64,
    pub real_pos: i64,
    pub row_id: i64,
    pub checksum: KvChecksum,
    pub column_permutation: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCheckpointDiff {
    pub status: Option<CheckpointStatus>,
    pub chunks: BTreeMap<ChunkCheckpointKey, ChunkCheckpointDiff>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCheckpointDiff {
    status: Option<CheckpointStatus>,
    rebase: Option<AutoIdBases>,
    checksum: Option<KvChecksum>,
    engines: BTreeMap<i32, EngineCheckpointDiff>,
}

impl TableCheckpointDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.rebase.is_none()
            && self.checksum.is_none()
            && self.engines.is_empty()
    }

    pub fn status(&self) -> Option<CheckpointStatus> {
        self.status
    }

    pub fn rebase(&self) -> Option<AutoIdBases> {
        self.rebase
    }

    pub fn checksum(&self) -> Option<KvChecksum> {
        self.checksum
    }

    pub fn engines(&self) -> &BTreeMap<i32, EngineCheckpointDiff> {
        &self.engines
    }

    pub fn engine(&self, engine_id: i32) -> Option<&EngineCheckpointDiff> {
        self.engines.get(&engine_id)
    }

    /// Iterates the pending chunk updates as `(engine_id, key, diff)`.
    pub fn chunks(&self) -> impl Iterator<Item = (i32, &ChunkCheckpointKey, &ChunkCheckpointDiff)> {
        self.engines.iter().flat_map(|(engine_id, engine)| {
            engine
                .chunks
                .iter()
                .map(move |(key, chunk)| (*engine_id, key, chunk))
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.engines.values().map(|e| e.chunks.len()).sum()
    }

    pub(crate) fn set_status(&mut self, status: CheckpointStatus) {
        self.status = Some(status);
    }

    pub(crate) fn rebase_to(&mut self, bases: AutoIdBases) {
        self.rebase = Some(match self.rebase {
            Some(current) => current.max(bases),
            None => bases,
        });
    }

    pub(crate) fn set_checksum(&mut self, checksum: KvChecksum) {
        self.checksum = Some(checksum);
    }

    pub(crate) fn engine_mut(&mut self, engine_id: i32) -> &mut EngineCheckpointDiff {
        self.engines.entry(engine_id).or_default()
    }
}
