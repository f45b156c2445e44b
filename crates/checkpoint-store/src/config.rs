use crate::{
    db::CheckpointsDb, error::CheckpointError, file::SledCheckpointsDb, mysql::MySqlCheckpointsDb,
    null::NullCheckpointsDb,
};
use checkpoint_model::CheckpointTarget;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr, sync::Arc};
use tracing::info;

pub const DEFAULT_SCHEMA: &str = "bulkload_checkpoint";
pub const DEFAULT_DSN: &str = "/tmp/bulkload_checkpoint";

pub const ENV_ENABLE: &str = "CHECKPOINT_ENABLE";
pub const ENV_DRIVER: &str = "CHECKPOINT_DRIVER";
pub const ENV_SCHEMA: &str = "CHECKPOINT_SCHEMA";
pub const ENV_DSN: &str = "CHECKPOINT_DSN";
pub const ENV_KEEP_AFTER_SUCCESS: &str = "CHECKPOINT_KEEP_AFTER_SUCCESS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointDriver {
    /// Embedded store in a local directory.
    #[default]
    File,
    Mysql,
}

impl FromStr for CheckpointDriver {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(CheckpointDriver::File),
            "mysql" => Ok(CheckpointDriver::Mysql),
            other => Err(CheckpointError::InvalidConfig(format!(
                "unknown checkpoint driver '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CheckpointDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointDriver::File => f.write_str("file"),
            CheckpointDriver::Mysql => f.write_str("mysql"),
        }
    }
}

/// What happens to the checkpoints once an import finishes successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepStrategy {
    #[default]
    Remove,
    /// Move to a backup named after the task id.
    Rename,
    /// Leave the checkpoints where they are.
    Origin,
}

impl KeepStrategy {
    pub async fn apply(self, db: &dyn CheckpointsDb, suffix: i64) -> Result<(), CheckpointError> {
        match self {
            KeepStrategy::Remove => db.remove_checkpoint(&CheckpointTarget::All).await,
            KeepStrategy::Rename => db.move_checkpoints(suffix).await,
            KeepStrategy::Origin => Ok(()),
        }
    }
}

impl FromStr for KeepStrategy {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" | "false" => Ok(KeepStrategy::Remove),
            "rename" | "true" => Ok(KeepStrategy::Rename),
            "origin" => Ok(KeepStrategy::Origin),
            other => Err(CheckpointError::InvalidConfig(format!(
                "unknown keep-after-success strategy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub enable: bool,
    pub driver: CheckpointDriver,
    pub schema: String,
    /// Directory of the file store, or the MySQL connection URL.
    pub dsn: String,
    pub keep_after_success: KeepStrategy,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enable: true,
            driver: CheckpointDriver::File,
            schema: DEFAULT_SCHEMA.to_string(),
            dsn: DEFAULT_DSN.to_string(),
            keep_after_success: KeepStrategy::Remove,
        }
    }
}

impl CheckpointConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overrides fields from `CHECKPOINT_*` variables. Other variables are
    /// ignored.
    pub fn from_vars<I, K, V>(mut self, vars: I) -> Result<Self, CheckpointError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                ENV_ENABLE => {
                    self.enable = match value.trim().to_ascii_lowercase().as_str() {
                        "1" | "true" | "yes" | "on" => true,
                        "0" | "false" | "no" | "off" => false,
                        other => {
                            return Err(CheckpointError::InvalidConfig(format!(
                                "{ENV_ENABLE} must be a boolean, got '{other}'"
                            )));
                        }
                    }
                }
                ENV_DRIVER => self.driver = value.parse()?,
                ENV_SCHEMA => self.schema = value.to_string(),
                ENV_DSN => self.dsn = value.to_string(),
                ENV_KEEP_AFTER_SUCCESS => self.keep_after_success = value.parse()?,
                _ => {}
            }
        }
        Ok(self)
    }

    pub fn from_env(self) -> Result<Self, CheckpointError> {
        self.from_vars(std::env::vars())
    }

    pub fn validate(&self) -> Result<(), CheckpointError> {
        if !self.enable {
            return Ok(());
        }
        if self.schema.trim().is_empty() {
            return Err(CheckpointError::InvalidConfig(
                "checkpoint schema must not be empty".into(),
            ));
        }
        if self.dsn.trim().is_empty() {
            return Err(CheckpointError::InvalidConfig(
                "checkpoint dsn must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Opens the store selected by `config`. Disabled checkpoints get the null
/// store.
pub async fn open_checkpoints_db(
    config: &CheckpointConfig,
) -> Result<Arc<dyn CheckpointsDb>, CheckpointError> {
    config.validate()?;
    if !config.enable {
        info!("Checkpoints disabled");
        return Ok(Arc::new(NullCheckpointsDb));
    }

    match config.driver {
        CheckpointDriver::File => Ok(Arc::new(SledCheckpointsDb::open(
            &config.dsn,
            &config.schema,
        )?)),
        CheckpointDriver::Mysql => Ok(Arc::new(
            MySqlCheckpointsDb::connect(&config.dsn, &config.schema).await?,
        )),
    }
}
