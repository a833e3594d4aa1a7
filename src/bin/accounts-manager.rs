use accounts_manager::{
    config::{Config, ProcessorKind},
    processor::create_data_processor,
};
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "accounts-manager", author, version, about, long_about = Some("Accounts Manager\n\n\
Builds a dated accounts index with the stake of every address"))]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "./config/config.yaml")]
    config: PathBuf,

    /// Directory holding the index mapping templates
    #[arg(long, default_value = "./config/indices")]
    indices_path: PathBuf,

    /// Which pipeline to run
    #[arg(long = "type", value_enum, default_value_t = ProcessorKind::Reindex)]
    kind: ProcessorKind,

    /// Max file log level
    #[arg(long, default_value_t = LevelFilter::DEBUG)]
    log_level: LevelFilter,

    /// Max stdout log level
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level_stdout: LevelFilter,

    /// Directory for log files, no file logging when absent
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let started = Instant::now();
    if let Err(e) = run(&cli).await {
        error!(error = %format!("{e:#}"), "accounts manager failed");
        return Err(e);
    }

    info!(duration_secs = started.elapsed().as_secs_f64(), "accounts manager done");
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    info!(config = %cli.config.display(), kind = ?cli.kind, "starting accounts manager");
    let config = Config::load(&cli.config)?;
    let processor = create_data_processor(&config, cli.kind, &cli.indices_path)?;
    processor.process_accounts_data().await
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let file_layer = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let log_file = std::fs::File::create(next_log_file(dir))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(log_file)
                    .with_filter(cli.log_level),
            )
        }
        None => None,
    };

    let stdout_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry()
        .with(stdout_layer.with_filter(cli.log_level_stdout))
        .with(file_layer)
        .init();
    Ok(())
}

/// First `accounts-manager-N.log` not yet present in `dir`
fn next_log_file(dir: &Path) -> PathBuf {
    (0..)
        .map(|n| dir.join(format!("accounts-manager-{n}.log")))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join("accounts-manager.log"))
}
