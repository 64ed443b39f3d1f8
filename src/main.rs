//! Kamaji - build target executor
//!
//! CLI entry point.

use clap::Parser;
use console::style;
use kamaji::cli::{commands, Cli};
use kamaji::config::{Config, ConfigManager, LogFormat};
use kamaji::error::{KamajiError, KamajiResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KamajiResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_tracing(cli.verbosity(), &config);
    debug!("Settings loaded from {}", config_manager.path().display());

    if cli.cleanup {
        let caller_dir = std::env::current_dir()
            .map_err(|e| KamajiError::io("getting current directory", e))?;
        let tmp_root =
            commands::run::resolve_tmp_root(cli.tmp_dir.as_deref(), &config, &caller_dir)?;
        return commands::cleanup(&tmp_root).await;
    }

    commands::run(&cli, &config).await
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_tracing(verbosity: u8, config: &Config) {
    let filter = match verbosity {
        0 => EnvFilter::new("kamaji=warn"),
        1 => EnvFilter::new("kamaji=info"),
        _ => EnvFilter::new("kamaji=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    match config.general.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
