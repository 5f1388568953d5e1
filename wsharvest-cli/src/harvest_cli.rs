//! Subcommand implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{info, warn};

use wsharvest_core::filter::is_valid_http_url;
use wsharvest_core::inspect::{DryRunInspector, ImageInspector, SkopeoInspector};
use wsharvest_core::{CatalogWriter, HarvestConfig, HarvestReport, WorkspacePipeline};

/// Folder name used when the manifest path has no usable parent directory
const DEFAULT_FOLDER_NAME: &str = "workspace";

/// Table row for run statistics
#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Counter")]
    counter: &'static str,
    #[tabled(rename = "Workspaces")]
    value: u64,
}

fn load_config(path: Option<&Path>) -> Result<HarvestConfig> {
    HarvestConfig::load(path).context("Failed to load harvest configuration")
}

pub async fn execute_run(
    config_path: Option<&Path>,
    output_dir: Option<PathBuf>,
    debug: Option<bool>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }
    if debug.is_some() {
        config.debug = debug;
    }
    if config.debug_enabled() {
        info!("Debug mode: discovery limited to one page of 5 repositories");
    }

    let report = harvest(&config).await?;

    let writer = CatalogWriter::new(&config.output_dir);
    writer.write(&report)?;

    println!(
        "Published {} of {} repositories ({} workspaces) to {}",
        report.catalog.len(),
        report.repositories.len(),
        report.catalog.workspace_count(),
        writer.output_dir().display()
    );
    print_stats(&report);
    Ok(())
}

#[cfg(feature = "github")]
async fn harvest(config: &HarvestConfig) -> Result<HarvestReport> {
    use wsharvest_core::discovery::GitHubSource;
    use wsharvest_core::Harvester;

    let source = Arc::new(GitHubSource::from_config(config)?);
    let harvester = Harvester::from_config(config, source)?;
    Ok(harvester.run().await?)
}

#[cfg(not(feature = "github"))]
async fn harvest(_config: &HarvestConfig) -> Result<HarvestReport> {
    anyhow::bail!("wsharvest was built without the `github` feature; discovery is unavailable")
}

fn print_stats(report: &HarvestReport) {
    let rows: Vec<StatsRow> = report
        .stats
        .rows()
        .into_iter()
        .map(|(counter, value)| StatsRow { counter, value })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
}

/// Folder name for a manifest: explicit, else its parent directory
fn folder_name_for(file: &Path, folder: Option<&str>) -> String {
    if let Some(folder) = folder {
        return folder.to_string();
    }
    file.parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FOLDER_NAME)
        .to_string()
}

/// Validate one manifest; returns whether it would be published
pub async fn execute_check(
    file: &Path,
    folder: Option<&str>,
    config_path: Option<&Path>,
    offline: bool,
) -> Result<bool> {
    let config = load_config(config_path)?;
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let inspector: Arc<dyn ImageInspector> = if offline {
        Arc::new(DryRunInspector)
    } else {
        Arc::new(SkopeoInspector::new(
            config.inspect_command.clone(),
            config.inspect_timeout(),
        ))
    };
    let pipeline = WorkspacePipeline::from_config(&config, inspector)?;
    let folder_name = folder_name_for(file, folder);

    match pipeline.process_manifest_text(&folder_name, &body).await {
        Ok(projected) => {
            println!("{}", serde_json::to_string_pretty(&projected)?);
            Ok(true)
        }
        Err(rejection) => {
            warn!("{} rejected", folder_name);
            eprintln!("Rejected {}: {}", folder_name, rejection);
            Ok(false)
        }
    }
}

pub fn execute_validate_url(url: &str) -> bool {
    let valid = is_valid_http_url(url);
    if valid {
        println!("valid: {url}");
    } else {
        println!("invalid: {url}");
    }
    valid
}
