use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// File probed in the home directory when no `--env-file` is given.
pub const DEFAULT_ENV_FILE: &str = ".checkpoint.env";

/// Process environment overlaid with the entries of `.env` files.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Builds the environment for a run: the explicit file if given,
    /// otherwise `~/.checkpoint.env` when it exists.
    pub fn for_run(env_file: Option<&Path>) -> Result<Self, CliError> {
        let mut env = Self::new();
        match env_file {
            Some(path) => env.load_from_file(path)?,
            None => {
                if let Some(path) = Self::default_file().filter(|p| p.is_file()) {
                    env.load_from_file(path)?;
                }
            }
        }
        Ok(env)
    }

    pub fn default_file() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_ENV_FILE))
    }

    /// Load variables from a .env file. File entries override the process
    /// environment.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Only the `CHECKPOINT_*` entries, sorted by key.
    pub fn checkpoint_vars(&self) -> Vec<(&str, &str)> {
        let mut vars: Vec<_> = self
            .vars
            .iter()
            .filter(|(key, _)| key.starts_with("CHECKPOINT_"))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        vars.sort();
        vars
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars.insert(key.to_string(), Self::unquote_value(value));
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }
        value.to_string()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
