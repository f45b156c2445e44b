//! Versioned names of the checkpoint relations.
//!
//! Every relation carries the schema version as a `_v<N>` suffix so stores
//! written by a different release are never read by accident.

use crate::error::CheckpointError;
use tracing::warn;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versions whose stores can be opened.
pub const SUPPORTED_VERSIONS: &[u32] = &[CURRENT_SCHEMA_VERSION];

/// Base names of the four relations, in the order they are moved or
/// dropped (children first).
pub const RELATIONS: [&str; 4] = ["chunk", "engine", "table", "task"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTables {
    pub version: u32,
    pub task: String,
    pub table: String,
    pub engine: String,
    pub chunk: String,
}

impl CheckpointTables {
    /// Relation names of a version this release can read.
    pub fn for_version(version: u32) -> Result<Self, CheckpointError> {
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(CheckpointError::UnsupportedSchemaVersion {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        Ok(Self::named(version))
    }

    pub fn current() -> Self {
        Self::named(CURRENT_SCHEMA_VERSION)
    }

    fn named(version: u32) -> Self {
        Self {
            version,
            task: format!("task_v{version}"),
            table: format!("table_v{version}"),
            engine: format!("engine_v{version}"),
            chunk: format!("chunk_v{version}"),
        }
    }

    /// Relation names, children first.
    pub fn names(&self) -> [&str; 4] {
        [&self.chunk, &self.engine, &self.table, &self.task]
    }
}

/// Splits `chunk_v3` into `("chunk", 3)`. Names that are not checkpoint
/// relations give `None`.
pub fn parse_versioned(name: &str) -> Option<(&str, u32)> {
    let (base, version) = name.rsplit_once("_v")?;
    if !RELATIONS.contains(&base) {
        return None;
    }
    version.parse().ok().map(|v| (base, v))
}

/// Inspects the relations already present in a checkpoint schema. Older
/// versions are left in place with a warning; a newer version means the
/// store was written by a later release and is refused.
pub fn check_existing<'a>(
    schema: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), CheckpointError> {
    for name in names {
        let Some((base, version)) = parse_versioned(name) else {
            continue;
        };
        if version > CURRENT_SCHEMA_VERSION {
            return Err(CheckpointError::UnsupportedSchemaVersion {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        if version < CURRENT_SCHEMA_VERSION {
            warn!(
                schema,
                relation = base,
                version,
                "Ignoring checkpoint relation of an older schema version"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn current_version_is_registered() {
        assert_eq!(
            CheckpointTables::for_version(CURRENT_SCHEMA_VERSION).unwrap(),
            CheckpointTables::current()
        );
        assert_eq!(CheckpointTables::current().table, "table_v1");
        assert_eq!(
            CheckpointTables::current().names(),
            ["chunk_v1", "engine_v1", "table_v1", "task_v1"]
        );
        assert!(matches!(
            CheckpointTables::for_version(9),
            Err(CheckpointError::UnsupportedSchemaVersion { found: 9, .. })
        ));
    }

    #[test]
    fn parses_relation_names() {
        assert_eq!(parse_versioned("chunk_v1"), Some(("chunk", 1)));
        assert_eq!(parse_versioned("table_v12"), Some(("table", 12)));
        assert_eq!(parse_versioned("orders_v1"), None);
        assert_eq!(parse_versioned("engine"), None);
        assert_eq!(parse_versioned("task_vx"), None);
    }

    #[test]
    fn refuses_newer_relations() {
        let err = check_existing("cp", ["task_v1", "chunk_v2"]).unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::UnsupportedSchemaVersion {
                found: 2,
                supported: 1
            }
        ));
    }

    #[traced_test]
    #[test]
    fn warns_about_older_relations() {
        check_existing("cp", ["chunk_v0", "unrelated"]).unwrap();
        assert!(logs_contain("older schema version"));
    }
}
