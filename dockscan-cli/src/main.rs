//! dockscan -- container image vulnerability and container risk scanner

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use dockscan_core::config::GeneralConfig;

use cli::{Cli, Commands, DEFAULT_CONFIG_PATH};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let writer = OutputWriter::new(cli.output);

    // config 서브커맨드는 잘못된 설정 파일도 보고해야 하므로 로드 전에 분기
    if let Commands::Config(args) = cli.command {
        init_logging(&GeneralConfig::default(), cli.log_level.as_deref())?;
        return commands::config::execute(args, &config_path, explicit, &writer).await;
    }

    let config = commands::config::load(&config_path, explicit).await?;
    init_logging(&config.general, cli.log_level.as_deref())?;

    tracing::debug!(
        config = %config_path.display(),
        max_concurrency = config.orchestrator.max_concurrency,
        "dockscan starting"
    );

    match cli.command {
        Commands::Images(args) => commands::images::execute(args, &config, &writer).await,
        Commands::Containers(args) => {
            commands::containers::execute(args, &config, &writer).await
        }
        Commands::Config(_) => Ok(()),
    }
}

fn init_logging(general: &GeneralConfig, level_override: Option<&str>) -> Result<(), CliError> {
    logging::init_tracing(general, level_override)
        .map_err(|e| CliError::Command(format!("failed to initialise logging: {e}")))
}
