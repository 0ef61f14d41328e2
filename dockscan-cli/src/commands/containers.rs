//! `dockscan containers` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dockscan_core::config::DockscanConfig;
use dockscan_core::types::{ContainerScanResult, ScanFinding};
use dockscan_scanner::RunSummary;

use crate::cli::ContainersArgs;
use crate::commands::{ConsoleSink, build_orchestrator, spawn_interrupt_handler};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, Table};

/// Execute the `containers` command.
pub async fn execute(
    _args: ContainersArgs,
    config: &DockscanConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    let orchestrator = build_orchestrator(config, cancel.clone()).await?;
    let interrupt = spawn_interrupt_handler(cancel);

    info!("scanning containers");

    let sink = Arc::new(ConsoleSink::new());
    let result = orchestrator.scan_containers(Arc::clone(&sink)).await;
    interrupt.abort();
    let summary = result?;

    let report = ContainerReport::new(sink.take_findings(), sink.take_failures(), summary);
    writer.render(&report)?;

    if summary.has_failures() {
        return Err(CliError::Scan(format!(
            "{} of {} containers could not be inspected",
            summary.failed, summary.submitted
        )));
    }
    Ok(())
}

/// Container risk report, rows sorted by short container ID.
///
/// Containers without risk signals do not appear.
#[derive(Serialize)]
pub struct ContainerReport {
    pub containers: Vec<ContainerScanResult>,
    pub failures: Vec<String>,
    pub summary: RunSummary,
}

impl ContainerReport {
    pub fn new(findings: Vec<ScanFinding>, failures: Vec<String>, summary: RunSummary) -> Self {
        let mut containers: Vec<ContainerScanResult> = findings
            .into_iter()
            .filter_map(|f| match f {
                ScanFinding::Container(r) => Some(r),
                ScanFinding::Image(_) => None,
            })
            .collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            containers,
            failures,
            summary,
        }
    }
}

impl Render for ContainerReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let mut table = Table::new(&[
            "ID",
            "IMAGE",
            "RUNNING",
            "PRIVILEGED",
            "PUBLISHEDALLPORTS",
            "HOSTMOUNTS",
            "CAPADD",
        ]);
        for row in &self.containers {
            table.push(vec![
                row.id.clone(),
                row.image.clone(),
                row.running.to_string(),
                row.privileged.to_string(),
                row.publish_all_ports.to_string(),
                row.host_mounts.len().to_string(),
                row.cap_add.join(","),
            ]);
        }
        table.write_to(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, privileged: bool, cap_add: &[&str]) -> ScanFinding {
        ScanFinding::Container(ContainerScanResult {
            id: id.to_owned(),
            image: "app:1".to_owned(),
            running: true,
            privileged,
            publish_all_ports: false,
            host_mounts: vec!["/srv".to_owned(), "/etc".to_owned()],
            cap_add: cap_add.iter().map(|c| (*c).to_owned()).collect(),
        })
    }

    #[test]
    fn test_container_report_sorts_by_id() {
        let report = ContainerReport::new(
            vec![finding("bbbbbbbbbbbb", true, &[]), finding("aaaaaaaaaaaa", false, &["NET_ADMIN"])],
            Vec::new(),
            RunSummary::default(),
        );
        let ids: Vec<&str> = report.containers.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aaaaaaaaaaaa", "bbbbbbbbbbbb"]);
    }

    #[test]
    fn test_container_report_text_columns() {
        let report = ContainerReport::new(
            vec![finding("0123456789ab", true, &["SYS_ADMIN", "NET_ADMIN"])],
            Vec::new(),
            RunSummary::default(),
        );
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        let lines: Vec<&str> = output.lines().collect();

        let header: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(
            header,
            vec!["ID", "IMAGE", "RUNNING", "PRIVILEGED", "PUBLISHEDALLPORTS", "HOSTMOUNTS", "CAPADD"]
        );
        let row: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(
            row,
            vec!["0123456789ab", "app:1", "true", "true", "false", "2", "SYS_ADMIN,NET_ADMIN"]
        );
    }

    #[test]
    fn test_container_report_empty_has_header_only() {
        let report = ContainerReport::new(Vec::new(), Vec::new(), RunSummary::default());
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        assert_eq!(String::from_utf8(buffer).expect("utf-8").lines().count(), 1);
    }
}
