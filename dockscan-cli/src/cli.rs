//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Config file used when `--config` is not given. A missing default file means "use defaults".
pub const DEFAULT_CONFIG_PATH: &str = "dockscan.toml";

/// dockscan -- scan container images for vulnerabilities and containers for risky settings.
///
/// Use `dockscan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "dockscan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the dockscan.toml configuration file [default: dockscan.toml].
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan one or more images for vulnerabilities.
    Images(ImagesArgs),

    /// Check every container on the host for risky runtime settings.
    Containers(ContainersArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- images ----

/// Build a throwaway scan image per target, run the scanning agent and report its summary.
#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Image references to scan (name:tag).
    #[arg(required = true, num_args = 1..)]
    pub images: Vec<String>,

    /// Scanning agent token.
    #[arg(long, env = "DOCKSCAN_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Do not pull target images before scanning.
    #[arg(long)]
    pub no_pull: bool,
}

// ---- containers ----

/// Inspect all containers (running or stopped).
#[derive(Args, Debug)]
pub struct ContainersArgs {}

// ---- config ----

/// Manage dockscan configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, engine, image_scan, orchestrator).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_images_with_token() {
        let cli = Cli::try_parse_from([
            "dockscan",
            "images",
            "alpine:3.19",
            "nginx:1.25",
            "--token",
            "abc",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Images(args) => {
                assert_eq!(args.images, vec!["alpine:3.19", "nginx:1.25"]);
                assert_eq!(args.token, "abc");
                assert!(!args.no_pull, "no_pull should default to false");
            }
            _ => panic!("expected Images command"),
        }
    }

    #[test]
    fn test_cli_parse_images_no_pull() {
        let cli = Cli::try_parse_from([
            "dockscan",
            "images",
            "--no-pull",
            "--token",
            "abc",
            "alpine:3.19",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Images(args) => assert!(args.no_pull, "no_pull should be true"),
            _ => panic!("expected Images command"),
        }
    }

    #[test]
    fn test_cli_parse_images_requires_target() {
        let result = Cli::try_parse_from(["dockscan", "images", "--token", "abc"]);
        assert!(result.is_err(), "images without targets should fail");
    }

    #[test]
    fn test_cli_parse_containers() {
        let cli = Cli::try_parse_from(["dockscan", "containers"]).expect("parse succeeded");
        assert!(matches!(cli.command, Commands::Containers(_)));
        assert!(cli.config.is_none(), "config should default to None");
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dockscan",
            "containers",
            "--output",
            "json",
            "--config",
            "/etc/dockscan.toml",
            "--log-level",
            "debug",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dockscan.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["dockscan", "config", "show", "--section", "engine"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Show { section } => assert_eq!(section.as_deref(), Some("engine")),
                ConfigAction::Validate => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_invalid_output_format() {
        let result = Cli::try_parse_from(["dockscan", "--output", "yaml", "containers"]);
        assert!(result.is_err(), "unknown output format should fail");
    }
}
