//! Aggregate catalog and its on-disk sink
//!
//! ```text
//! generated/
//! ├── repos.json                 ← every repository discovery returned
//! ├── community_workspaces.json  ← repo → { github_pages, stars, last_commit, workspaces }
//! ├── categories.json            ← sorted union of published categories
//! └── stats.json                 ← run counters
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::stats::StatsSnapshot;

/// One published repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Validated GitHub Pages URL
    #[serde(rename = "github_pages")]
    pub pages_url: String,

    pub stars: u64,

    /// Last push timestamp as reported by discovery (opaque)
    #[serde(rename = "last_commit")]
    pub last_commit_timestamp: String,

    /// Folder name → manifest in its original shape
    pub workspaces: BTreeMap<String, Value>,
}

impl CatalogEntry {
    pub fn new(
        pages_url: impl Into<String>,
        stars: u64,
        last_commit_timestamp: impl Into<String>,
        workspaces: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            pages_url: pages_url.into(),
            stars,
            last_commit_timestamp: last_commit_timestamp.into(),
            workspaces,
        }
    }
}

/// Repository full name → published entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, repository: impl Into<String>, entry: CatalogEntry) {
        self.entries.insert(repository.into(), entry);
    }

    pub fn get(&self, repository: &str) -> Option<&CatalogEntry> {
        self.entries.get(repository)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of published workspaces across repositories
    pub fn workspace_count(&self) -> usize {
        self.entries.values().map(|e| e.workspaces.len()).sum()
    }

    /// Sorted, de-duplicated categories of every published workspace
    pub fn categories(&self) -> Vec<String> {
        let mut categories = BTreeSet::new();
        for entry in self.entries.values() {
            for workspace in entry.workspaces.values() {
                if let Some(Value::Array(items)) = workspace.get("categories") {
                    categories.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
            }
        }
        categories.into_iter().collect()
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    /// When the run finished (RFC 3339)
    pub generated: String,

    /// Repositories returned by discovery, in discovery order
    pub repositories: Vec<String>,

    pub catalog: Catalog,

    pub stats: StatsSnapshot,
}

#[derive(Serialize)]
struct StatsFile<'a> {
    generated: &'a str,
    repositories: usize,
    published_repositories: usize,
    published_workspaces: usize,
    #[serde(flatten)]
    stats: &'a StatsSnapshot,
}

/// Writes a [`HarvestReport`] as JSON files into one directory
pub struct CatalogWriter {
    output_dir: PathBuf,
}

impl CatalogWriter {
    pub const REPOS_FILE: &'static str = "repos.json";
    pub const CATALOG_FILE: &'static str = "community_workspaces.json";
    pub const CATEGORIES_FILE: &'static str = "categories.json";
    pub const STATS_FILE: &'static str = "stats.json";

    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write(&self, report: &HarvestReport) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })?;

        self.write_json(Self::REPOS_FILE, &report.repositories)?;
        self.write_json(Self::CATALOG_FILE, &report.catalog)?;
        self.write_json(Self::CATEGORIES_FILE, &report.catalog.categories())?;
        self.write_json(
            Self::STATS_FILE,
            &StatsFile {
                generated: &report.generated,
                repositories: report.repositories.len(),
                published_repositories: report.catalog.len(),
                published_workspaces: report.catalog.workspace_count(),
                stats: &report.stats,
            },
        )?;

        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {file_name}"))?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Results saved to {}", path.display());
        Ok(())
    }
}
