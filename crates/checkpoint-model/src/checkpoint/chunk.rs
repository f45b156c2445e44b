use crate::{
    checksum::KvChecksum,
    source::{Chunk, SourceFileMeta},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a chunk within one engine of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkCheckpointKey {
    pub path: String,
    pub offset: i64,
}

impl ChunkCheckpointKey {
    pub fn new(path: impl Into<String>, offset: i64) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

impl fmt::Display for ChunkCheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.offset)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCheckpoint {
    pub key: ChunkCheckpointKey,
    pub file_meta: SourceFileMeta,
    /// Maps source columns to target columns. `Some(vec![])` means identity
    /// and is kept distinct from `None` (no mapping recorded).
    pub column_permutation: Option<Vec<i32>>,
    pub chunk: Chunk,
    pub checksum: KvChecksum,
    /// Unix seconds of the last update. Audit only.
    pub timestamp: i64,
}
