use crate::error::ModelError;
use std::{fmt, str::FromStr};

/// Scope of the remove / ignore / destroy operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckpointTarget {
    All,
    Table(String),
}

impl CheckpointTarget {
    pub fn table(&self) -> Option<&str> {
        match self {
            CheckpointTarget::All => None,
            CheckpointTarget::Table(name) => Some(name),
        }
    }
}

impl FromStr for CheckpointTarget {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ModelError::InvalidTarget(s.to_string())),
            "all" => Ok(CheckpointTarget::All),
            name => Ok(CheckpointTarget::Table(name.to_string())),
        }
    }
}

impl fmt::Display for CheckpointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointTarget::All => f.write_str("all"),
            CheckpointTarget::Table(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_and_table_names() {
        assert_eq!("all".parse::<CheckpointTarget>(), Ok(CheckpointTarget::All));
        assert_eq!(
            "`db1`.`t2`".parse::<CheckpointTarget>(),
            Ok(CheckpointTarget::Table("`db1`.`t2`".into()))
        );
        assert!("  ".parse::<CheckpointTarget>().is_err());
    }
}
