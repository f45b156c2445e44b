use checkpoint_model::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint row exists for the table. Callers treat this as a
    /// fresh start rather than a failure.
    #[error("checkpoint for table {0} not found")]
    NotFound(String),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("Embedded store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to encode or decode a stored row: {0}")]
    Codec(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Inconsistent row in {table}: {reason}")]
    InconsistentRow { table: String, reason: String },

    #[error("Failed to bootstrap checkpoint schema {schema}: {reason}")]
    SchemaBootstrap { schema: String, reason: String },

    #[error("Unsupported checkpoint schema version {found} (supported: {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },

    #[error("Table info of {0} differs from the one stored in the checkpoint")]
    TableInfoMismatch(String),

    #[error("Checkpoint backup {0} already exists")]
    BackupExists(String),

    #[error("Checkpoint store is closed")]
    Closed,

    #[error("Invalid checkpoint configuration: {0}")]
    InvalidConfig(String),
}

impl CheckpointError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckpointError::NotFound(_))
    }

    pub(crate) fn inconsistent(table: &str, reason: impl ToString) -> Self {
        CheckpointError::InconsistentRow {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn from_model(table: &str, err: ModelError) -> Self {
        Self::inconsistent(table, err)
    }
}
