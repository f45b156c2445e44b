use crate::{checkpoint::chunk::ChunkCheckpoint, status::CheckpointStatus};
use serde::{Deserialize, Serialize};

/// Reserved engine id for the table-level pseudo-engine. Shard engines use
/// non-negative ids.
pub const WHOLE_TABLE_ENGINE_ID: i32 = -1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCheckpoint {
    pub status: CheckpointStatus,
    /// Chunks in processing order.
    pub chunks: Vec<ChunkCheckpoint>,
}

impl EngineCheckpoint {
    pub fn new(status: CheckpointStatus) -> Self {
        Self {
            status,
            chunks: Vec::new(),
        }
    }
}
