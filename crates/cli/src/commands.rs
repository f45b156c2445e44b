use checkpoint_model::CheckpointTarget;
use checkpoint_store::CheckpointDriver;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Where the checkpoints live. Flags win over the env file, which wins over
/// the JSON config.
#[derive(Args, Debug, Default)]
pub struct StoreArgs {
    #[arg(long, global = true, help = "JSON checkpoint config file")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Load CHECKPOINT_* variables from this .env file (defaults to ~/.checkpoint.env if present)"
    )]
    pub env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Checkpoint driver: file or mysql")]
    pub driver: Option<CheckpointDriver>,

    #[arg(long, global = true, help = "Store directory or MySQL connection URL")]
    pub dsn: Option<String>,

    #[arg(long, global = true, help = "Checkpoint schema name")]
    pub schema: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the checkpoint of one table as JSON
    Show {
        #[arg(long, help = "Quoted table name, e.g. `db`.`t`")]
        table: String,

        #[arg(long, help = "Print a one-line summary per engine instead of JSON")]
        summary: bool,
    },
    /// Delete checkpoints
    Remove {
        #[arg(long, help = "Quoted table name, or 'all'")]
        target: CheckpointTarget,
    },
    /// Clear error statuses so the next run retries
    ErrorIgnore {
        #[arg(long, help = "Quoted table name, or 'all'")]
        target: CheckpointTarget,
    },
    /// Delete failed checkpoints and list the engines to clean up
    ErrorDestroy {
        #[arg(long, help = "Quoted table name, or 'all'")]
        target: CheckpointTarget,
    },
    /// Write tables.csv, engines.csv and chunks.csv into a directory
    Dump {
        #[arg(long, help = "Output directory, created if missing")]
        dir: PathBuf,
    },
    /// Move all checkpoints to a backup
    Rotate {
        #[arg(long, help = "Backup suffix (defaults to the current unix time)")]
        suffix: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;

    #[test]
    fn parses_global_store_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "checkpoint-ctl",
            "error-destroy",
            "--target",
            "all",
            "--driver",
            "mysql",
            "--dsn",
            "mysql://root@127.0.0.1:4000/",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::ErrorDestroy {
                target: CheckpointTarget::All
            }
        ));
        assert_eq!(cli.store.driver, Some(CheckpointDriver::Mysql));
        assert_eq!(cli.store.dsn.as_deref(), Some("mysql://root@127.0.0.1:4000/"));
    }

    #[test]
    fn table_target_keeps_quoted_name() {
        let cli =
            Cli::try_parse_from(["checkpoint-ctl", "remove", "--target", "`db`.`t`"]).unwrap();
        match cli.command {
            Commands::Remove { target } => {
                assert_eq!(target, CheckpointTarget::Table("`db`.`t`".into()))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_driver() {
        assert!(
            Cli::try_parse_from(["checkpoint-ctl", "rotate", "--driver", "postgres"]).is_err()
        );
    }
}
