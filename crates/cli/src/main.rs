use crate::{
    commands::{Commands, StoreArgs},
    env::EnvManager,
    error::CliError,
};
use checkpoint_store::{CheckpointConfig, CheckpointsDb, open_checkpoints_db};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;

#[derive(Parser)]
#[command(
    name = "checkpoint-ctl",
    version = "0.1.0",
    about = "Inspect and repair bulk load checkpoints"
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.store)?;
    info!(driver = %config.driver, schema = %config.schema, "Opening checkpoint store");

    let db = open_checkpoints_db(&config).await?;
    let result = run(cli.command, db.as_ref()).await;
    db.close().await?;
    result
}

/// Layers the JSON config, `CHECKPOINT_*` variables and command line flags.
fn resolve_config(args: &StoreArgs) -> Result<CheckpointConfig, CliError> {
    let base = match &args.config {
        Some(path) => CheckpointConfig::from_json_file(path)?,
        None => CheckpointConfig::default(),
    };

    let env = EnvManager::for_run(args.env_file.as_deref())?;
    let mut config = base.from_vars(env.checkpoint_vars())?;

    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if let Some(dsn) = &args.dsn {
        config.dsn = dsn.clone();
    }
    if let Some(schema) = &args.schema {
        config.schema = schema.clone();
    }
    // The operator tool is pointless against the null store.
    config.enable = true;
    config.validate()?;
    Ok(config)
}

async fn run(command: Commands, db: &dyn CheckpointsDb) -> Result<(), CliError> {
    match command {
        Commands::Show { table, summary } => {
            let cp = db.get(&table).await?;
            output::print_checkpoint(&table, &cp, summary)?;
        }
        Commands::Remove { target } => {
            db.remove_checkpoint(&target).await?;
            println!("Removed checkpoints of {target}");
        }
        Commands::ErrorIgnore { target } => {
            db.ignore_error_checkpoint(&target).await?;
            println!("Cleared error statuses of {target}");
        }
        Commands::ErrorDestroy { target } => {
            let destroyed = db.destroy_error_checkpoint(&target).await?;
            print!("{}", output::format_destroyed(&destroyed));
        }
        Commands::Dump { dir } => {
            for path in output::dump_all(db, &dir).await? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::Rotate { suffix } => {
            let suffix = suffix.unwrap_or_else(|| chrono::Utc::now().timestamp());
            db.move_checkpoints(suffix).await?;
            println!("Moved checkpoints to backup suffix {suffix}");
        }
    }
    Ok(())
}
