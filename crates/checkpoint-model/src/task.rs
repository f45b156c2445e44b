use serde::{Deserialize, Serialize};

/// Task-level checkpoint row, one per checkpoint schema.
///
/// Stored on every `initialize` so a resumed run can be compared with the
/// configuration that produced the existing checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheckpoint {
    pub task_id: i64,
    pub source_dir: String,
    /// Importer backend mode, e.g. `local` or `tidb`.
    pub backend: String,
    pub importer_addr: String,
    pub tidb_host: String,
    pub tidb_port: i32,
    pub pd_addr: String,
    pub sorted_kv_dir: String,
    pub tool_version: String,
}
