//! `dockscan config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use dockscan_core::config::DockscanConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Known top-level configuration sections.
const SECTIONS: [&str; 4] = ["general", "engine", "image_scan", "orchestrator"];

/// Execute the `config` command.
///
/// `explicit` is true when the path came from `--config`; only then is a
/// missing file an error.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, explicit, writer).await,
        ConfigAction::Show { section } => {
            execute_show(config_path, explicit, section, writer).await
        }
    }
}

/// Load the effective configuration (file + env overrides + defaults).
pub async fn load(config_path: &Path, explicit: bool) -> Result<DockscanConfig, CliError> {
    let config = if explicit {
        DockscanConfig::load(config_path).await?
    } else {
        DockscanConfig::load_or_default(config_path).await?
    };
    Ok(config)
}

/// Execute the config validate subcommand.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (parse errors, invalid values).
async fn execute_validate(
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match load(config_path, explicit).await {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Execute the config show subcommand.
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if section name is invalid.
async fn execute_show(
    config_path: &Path,
    explicit: bool,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = load(config_path, explicit).await?;
    let report = build_config_report(&config, config_path, section)?;
    writer.render(&report)?;

    Ok(())
}

fn build_config_report(
    config: &DockscanConfig,
    config_path: &Path,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section.as_deref() {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("engine") => toml::to_string_pretty(&config.engine),
        Some("image_scan") => toml::to_string_pretty(&config.image_scan),
        Some("orchestrator") => toml::to_string_pretty(&config.orchestrator),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    }
    .map_err(|e| CliError::Command(format!("failed to serialize configuration: {e}")))?;

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
    })
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_report_full() {
        let config = DockscanConfig::default();
        let report = build_config_report(&config, Path::new("dockscan.toml"), None)
            .expect("report should build");
        assert!(report.section.is_none());
        for section in SECTIONS {
            assert!(
                report.config_toml.contains(&format!("[{section}]")),
                "full config should contain [{section}]"
            );
        }
    }

    #[test]
    fn test_build_config_report_single_section() {
        let config = DockscanConfig::default();
        let report = build_config_report(
            &config,
            Path::new("dockscan.toml"),
            Some("image_scan".to_owned()),
        )
        .expect("report should build");
        assert!(report.config_toml.contains("scanner_image"));
        assert!(!report.config_toml.contains("max_concurrency"));
    }

    #[test]
    fn test_build_config_report_unknown_section() {
        let config = DockscanConfig::default();
        let err = build_config_report(&config, Path::new("dockscan.toml"), Some("network".to_owned()))
            .err()
            .expect("unknown section should fail");
        assert!(err.to_string().contains("unknown section: network"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_validation_report_json_omits_nothing() {
        let report = ConfigValidationReport {
            source: "dockscan.toml".to_owned(),
            valid: false,
            errors: vec!["bad value".to_owned()],
        };
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0], "bad value");
    }

    #[test]
    fn test_config_report_json_skips_toml() {
        let report = ConfigReport {
            source: "dockscan.toml".to_owned(),
            section: None,
            config_toml: "[general]".to_owned(),
        };
        let json = serde_json::to_value(&report).expect("json");
        assert!(json.get("config_toml").is_none());
        assert!(json.get("section").is_none());
    }

    #[tokio::test]
    async fn test_load_missing_default_file_uses_defaults() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("dockscan.toml");
        let config = load(&path, false).await.expect("defaults");
        assert_eq!(config.image_scan.tag_prefix, "scan");
    }

    #[tokio::test]
    async fn test_load_missing_explicit_file_is_config_error() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("missing.toml");
        let err = load(&path, true).await.err().expect("should fail");
        assert_eq!(err.exit_code(), 2);
    }
}
