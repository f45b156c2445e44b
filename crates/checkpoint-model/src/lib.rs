pub mod checkpoint;
pub mod checksum;
pub mod diff;
pub mod error;
pub mod naming;
pub mod source;
pub mod status;
pub mod target;
pub mod task;

pub use checkpoint::{
    chunk::{ChunkCheckpoint, ChunkCheckpointKey},
    engine::{EngineCheckpoint, WHOLE_TABLE_ENGINE_ID},
    table::{DestroyedTableCheckpoint, TableCheckpoint, TableDescriptor, TableInfo},
};
pub use checksum::KvChecksum;
pub use diff::{
    TableCheckpointDiff,
    merger::{
        ChunkCheckpointMerger, RebaseCheckpointMerger, StatusCheckpointMerger,
        TableCheckpointMerger, TableChecksumMerger,
    },
};
pub use status::{CheckpointPhase, CheckpointStatus, ERROR_THRESHOLD};
pub use target::CheckpointTarget;
pub use task::TaskCheckpoint;
