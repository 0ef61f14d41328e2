//! Command handlers -- one module per subcommand

pub mod config;
pub mod containers;
pub mod images;

use std::sync::Arc;
use std::sync::Mutex;

use colored::Colorize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use dockscan_core::config::DockscanConfig;
use dockscan_core::types::ScanFinding;
use dockscan_scanner::{
    BollardEngineClient, CollectingSink, ReportSink, ScanError, ScanOrchestrator,
    ScanOrchestratorBuilder, ScannerConfig,
};

use crate::error::CliError;

/// Report sink that prints failures to stderr as they arrive and keeps results for the table.
pub struct ConsoleSink {
    results: CollectingSink,
    failures: Mutex<Vec<String>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            results: CollectingSink::new(),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Collected results in arrival order.
    pub fn take_findings(&self) -> Vec<ScanFinding> {
        self.results.take_findings()
    }

    /// Failure messages in arrival order.
    pub fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl ReportSink for ConsoleSink {
    fn on_result(&self, finding: ScanFinding) {
        self.results.on_result(finding);
    }

    fn on_failure(&self, error: ScanError) {
        let message = error.to_string();
        eprintln!("{} {}", "error:".red().bold(), message);
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(message);
    }
}

/// Connects to the engine and builds an orchestrator sharing `cancel`.
pub async fn build_orchestrator(
    config: &DockscanConfig,
    cancel: CancellationToken,
) -> Result<ScanOrchestrator<BollardEngineClient>, CliError> {
    let scanner_config = ScannerConfig::from_core(config);
    let engine = BollardEngineClient::connect(
        &scanner_config.docker_socket,
        scanner_config.engine_timeout_secs,
    )
    .map_err(|e| CliError::Command(e.to_string()))?;

    let orchestrator = ScanOrchestratorBuilder::new()
        .config(scanner_config)
        .engine(Arc::new(engine))
        .cancellation_token(cancel)
        .build()?;
    orchestrator.check_engine().await?;
    Ok(orchestrator)
}

/// Cancels `token` on Ctrl-C so running pipelines remove their artifacts before exit.
pub fn spawn_interrupt_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, cancelling scans");
                eprintln!("{}", "interrupted, cleaning up scan artifacts...".yellow());
                token.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt signal"),
        }
    })
}
