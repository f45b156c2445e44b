pub mod buffer;
pub mod config;
pub mod db;
pub mod dump;
pub mod error;
pub mod file;
pub mod mysql;
pub mod null;
pub mod rows;
pub mod schema;

pub use buffer::DiffBuffer;
pub use config::{CheckpointConfig, CheckpointDriver, KeepStrategy, open_checkpoints_db};
pub use db::CheckpointsDb;
pub use error::CheckpointError;
pub use file::SledCheckpointsDb;
pub use mysql::MySqlCheckpointsDb;
pub use null::NullCheckpointsDb;
