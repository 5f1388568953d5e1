//! wsharvest - community workspace catalog builder
//!
//! Discovers community workspace repositories, screens and verifies their
//! manifests, and writes the published catalog.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod harvest_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "wsharvest",
    about = "Build the community workspace catalog from discovered repositories",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    json_logs: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Discover repositories, validate their workspaces and write the catalog
    Run {
        /// Harvest configuration file (YAML)
        #[clap(long)]
        config: Option<PathBuf>,

        /// Directory receiving the generated JSON files
        #[clap(long)]
        output_dir: Option<PathBuf>,

        /// Limit discovery to a single small page
        #[clap(long, conflicts_with = "no_debug")]
        debug: bool,

        /// Run full-size discovery even if DEBUG is set
        #[clap(long)]
        no_debug: bool,
    },

    /// Run one local workspace.json through the validation pipeline
    Check {
        /// Path to the manifest
        file: PathBuf,

        /// Folder name to validate under (defaults to the parent directory name)
        #[clap(long)]
        folder: Option<String>,

        /// Harvest configuration file (YAML)
        #[clap(long)]
        config: Option<PathBuf>,

        /// Treat every non-reserved image as retrievable instead of inspecting it
        #[clap(long)]
        offline: bool,
    },

    /// Check whether a URL is an acceptable http(s) pages URL
    ValidateUrl {
        url: String,
    },
}

/// Initialize tracing with CLI flags
///
/// `RUST_LOG` directives are added on top of `--log-level`. Logs always go to
/// stderr so stdout stays usable for JSON output.
fn initialize_tracing(log_level: &LogLevel, json_logs: bool) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());
    if let Ok(extra) = std::env::var("RUST_LOG") {
        for directive in extra.split(',').filter(|d| !d.trim().is_empty()) {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.json_logs);

    match cli.command {
        Command::Run {
            config,
            output_dir,
            debug,
            no_debug,
        } => {
            let debug = match (debug, no_debug) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            harvest_cli::execute_run(config.as_deref(), output_dir, debug).await
        }
        Command::Check {
            file,
            folder,
            config,
            offline,
        } => {
            let accepted =
                harvest_cli::execute_check(&file, folder.as_deref(), config.as_deref(), offline)
                    .await?;
            if !accepted {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::ValidateUrl { url } => {
            if !harvest_cli::execute_validate_url(&url) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
