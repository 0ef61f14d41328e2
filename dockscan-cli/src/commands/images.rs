//! `dockscan images` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dockscan_core::config::DockscanConfig;
use dockscan_core::types::{ImageScanResult, ScanFinding};
use dockscan_scanner::{ImageScanOptions, RunSummary, ScanToken};

use crate::cli::ImagesArgs;
use crate::commands::{ConsoleSink, build_orchestrator, spawn_interrupt_handler};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, Table};

/// Execute the `images` command.
pub async fn execute(
    args: ImagesArgs,
    config: &DockscanConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let cancel = CancellationToken::new();
    let orchestrator = build_orchestrator(config, cancel.clone()).await?;
    let interrupt = spawn_interrupt_handler(cancel);

    info!(images = args.images.len(), no_pull = args.no_pull, "scanning images");

    let sink = Arc::new(ConsoleSink::new());
    let options = ImageScanOptions::new(ScanToken::new(args.token), args.no_pull);
    let summary = orchestrator
        .scan_images(args.images, options, Arc::clone(&sink))
        .await;
    interrupt.abort();

    let report = ImageReport::new(sink.take_findings(), sink.take_failures(), summary);
    writer.render(&report)?;

    if summary.has_failures() {
        return Err(CliError::Scan(format!(
            "{} of {} images failed",
            summary.failed, summary.submitted
        )));
    }
    Ok(())
}

/// Image scan report, rows sorted by image reference.
#[derive(Serialize)]
pub struct ImageReport {
    pub images: Vec<ImageScanResult>,
    pub failures: Vec<String>,
    pub summary: RunSummary,
}

impl ImageReport {
    pub fn new(findings: Vec<ScanFinding>, failures: Vec<String>, summary: RunSummary) -> Self {
        let mut images: Vec<ImageScanResult> = findings
            .into_iter()
            .filter_map(|f| match f {
                ScanFinding::Image(r) => Some(r),
                ScanFinding::Container(_) => None,
            })
            .collect();
        images.sort_by(|a, b| a.image.cmp(&b.image));
        Self {
            images,
            failures,
            summary,
        }
    }
}

impl Render for ImageReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let mut table = Table::new(&["ID", "TOTAL", "LOW", "MEDIUM", "HIGH", "MALWARE"]);
        for row in &self.images {
            let s = &row.summary;
            table.push(vec![
                row.image.clone(),
                s.total.to_string(),
                s.low.to_string(),
                s.medium.to_string(),
                s.high.to_string(),
                s.malware.to_string(),
            ]);
        }
        table.write_to(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockscan_core::types::VulnerabilitySummary;

    fn finding(image: &str, total: u64, high: u64) -> ScanFinding {
        ScanFinding::Image(ImageScanResult {
            image: image.to_owned(),
            summary: VulnerabilitySummary {
                total,
                high,
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_image_report_sorts_rows() {
        let report = ImageReport::new(
            vec![finding("nginx:1.25", 4, 1), finding("alpine:3.19", 0, 0)],
            Vec::new(),
            RunSummary::default(),
        );
        let ids: Vec<&str> = report.images.iter().map(|r| r.image.as_str()).collect();
        assert_eq!(ids, vec!["alpine:3.19", "nginx:1.25"]);
    }

    #[test]
    fn test_image_report_text_columns() {
        let report = ImageReport::new(
            vec![finding("nginx:1.25", 40, 9)],
            vec!["error building scan image legacy:0.1".to_owned()],
            RunSummary::default(),
        );
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2, "failures are not repeated in the table");
        let header: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(header, vec!["ID", "TOTAL", "LOW", "MEDIUM", "HIGH", "MALWARE"]);
        let row: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(row, vec!["nginx:1.25", "40", "0", "0", "9", "0"]);
    }

    #[test]
    fn test_image_report_json_shape() {
        let report = ImageReport::new(
            vec![finding("nginx:1.25", 40, 9)],
            vec!["boom".to_owned()],
            RunSummary {
                submitted: 2,
                succeeded: 1,
                failed: 1,
                silent: 0,
            },
        );
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["images"][0]["Image"], "nginx:1.25");
        assert_eq!(json["images"][0]["vulnerability_summary"]["high"], 9);
        assert_eq!(json["failures"][0], "boom");
        assert_eq!(json["summary"]["failed"], 1);
    }
}
