use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

mod config;
mod notify;
mod orchestrator;
mod probe;
mod store;

use crate::config::Config;
use crate::notify::{RunMode, SmtpTransport};
use crate::orchestrator::Orchestrator;
use crate::probe::ProbeRunner;
use crate::store::{Store, StoreImpl, initialize_database};

#[derive(Parser)]
#[command(name = "hostwatch")]
#[command(about = "Host availability watchdog with email digests", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single check cycle and exit
    Run,

    /// Run check cycles forever in the foreground
    /// (background execution is left to the service supervisor)
    Watch,

    /// Destroy all persisted status and send history
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref()).context("failed to load configuration")?;

    let db = libsql::Builder::new_local(&config.database.path)
        .build()
        .await
        .with_context(|| format!("failed to open database at {}", config.database.path))?;
    let conn = db.connect()?;
    initialize_database(&conn).await?;
    let store = Arc::new(StoreImpl::new(conn));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            build_orchestrator(config, store, RunMode::Once)?.run_once().await?;
        }
        Commands::Watch => {
            build_orchestrator(config, store, RunMode::Daemon)?.run_forever().await;
        }
        Commands::Reset => {
            store.reset().await?;
            info!("persisted state cleared");
        }
    }

    Ok(())
}

fn build_orchestrator(
    config: Config,
    store: Arc<StoreImpl>,
    mode: RunMode,
) -> Result<Orchestrator> {
    let prober = Arc::new(ProbeRunner::new(&config.probe)?);
    let transport =
        Arc::new(SmtpTransport::new(&config.email).context("invalid email configuration")?);
    Ok(Orchestrator::new(Arc::new(config), store, prober, transport, mode))
}
