//! Pipeline coordination
//!
//! [`WorkspacePipeline`] runs one manifest through the stages in order:
//!
//! ```text
//! raw JSON ─▶ content filter ─▶ normalize ─▶ pullability (cap + inspect) ─▶ project original
//! ```
//!
//! Any stage may reject; the rejection is counted, logged by the caller and
//! never interrupts sibling folders. [`Harvester`] drives discovery and turns
//! surviving workspaces into catalog entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogEntry, HarvestReport};
use crate::config::HarvestConfig;
use crate::discovery::{RepositoryListing, RepositorySource};
use crate::error::{HarvestError, Rejection, Result};
use crate::filter::{is_valid_http_url, ContentFilter, DisallowedTerms, ImageFilter};
use crate::inspect::{ImageInspector, SkopeoInspector};
use crate::manifest::normalize;
use crate::projector::project_original;
use crate::pullability::PullabilityChecker;
use crate::stats::HarvestStats;

/// Validation stages for a single workspace manifest
#[derive(Clone)]
pub struct WorkspacePipeline {
    content_filter: ContentFilter,
    checker: PullabilityChecker,
    stats: Arc<HarvestStats>,
}

impl WorkspacePipeline {
    pub fn new(content_filter: ContentFilter, checker: PullabilityChecker) -> Self {
        Self {
            content_filter,
            checker,
            stats: Arc::new(HarvestStats::new()),
        }
    }

    /// Share an existing counter set instead of owning a fresh one
    pub fn with_stats(mut self, stats: Arc<HarvestStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Build the stages described by `config` around `inspector`
    pub fn from_config(config: &HarvestConfig, inspector: Arc<dyn ImageInspector>) -> Result<Self> {
        let terms = match &config.disallowed_terms_file {
            Some(path) => DisallowedTerms::with_file(path)
                .map_err(|e| HarvestError::Config(format!("{e:#}")))?,
            None => DisallowedTerms::default(),
        };

        let checker = PullabilityChecker::new(inspector)
            .with_image_filter(ImageFilter::new(config.image_prefix_filters.clone()))
            .with_max_entries(config.max_compatibility_entries)
            .with_concurrency(config.inspect_concurrency);

        Ok(Self::new(ContentFilter::new(Arc::new(terms)), checker))
    }

    pub fn stats(&self) -> &HarvestStats {
        &self.stats
    }

    /// Run every stage on a parsed manifest.
    ///
    /// Returns the original document filtered to verified entries.
    pub async fn process_workspace(
        &self,
        folder_name: &str,
        raw: &Value,
    ) -> std::result::Result<Value, Rejection> {
        let result = self.run_stages(folder_name, raw).await;
        if let Err(rejection) = &result {
            rejection.record(&self.stats);
        }
        result
    }

    /// Parse a manifest body, then [`process_workspace`](Self::process_workspace)
    pub async fn process_manifest_text(
        &self,
        folder_name: &str,
        body: &str,
    ) -> std::result::Result<Value, Rejection> {
        let raw: Value = match serde_json::from_str(body) {
            Ok(raw) => raw,
            Err(e) => {
                let rejection = Rejection::malformed(format!("invalid JSON: {e}"));
                rejection.record(&self.stats);
                return Err(rejection);
            }
        };
        self.process_workspace(folder_name, &raw).await
    }

    async fn run_stages(
        &self,
        folder_name: &str,
        raw: &Value,
    ) -> std::result::Result<Value, Rejection> {
        self.content_filter.check(raw, folder_name, &self.stats)?;

        let normalized = normalize(raw, folder_name)?;
        let canonical = normalized
            .get(folder_name)
            .ok_or_else(|| Rejection::malformed("normalization produced no manifest"))?;

        let verified = self.checker.filter_pullable(canonical, &self.stats).await?;
        debug!(
            "{}: {} of {} compatibility entries verified",
            folder_name,
            verified.compatibility.len(),
            canonical.compatibility.len()
        );

        project_original(raw, Some(&verified))
    }
}

/// Discovery-driven catalog builder
pub struct Harvester {
    source: Arc<dyn RepositorySource>,
    pipeline: WorkspacePipeline,
}

impl Harvester {
    pub fn new(source: Arc<dyn RepositorySource>, pipeline: WorkspacePipeline) -> Self {
        Self { source, pipeline }
    }

    /// Harvester using `skopeo` for inspection, configured from `config`
    pub fn from_config(config: &HarvestConfig, source: Arc<dyn RepositorySource>) -> Result<Self> {
        let inspector = Arc::new(SkopeoInspector::new(
            config.inspect_command.clone(),
            config.inspect_timeout(),
        ));
        Ok(Self::new(source, WorkspacePipeline::from_config(config, inspector)?))
    }

    pub fn stats(&self) -> &HarvestStats {
        self.pipeline.stats()
    }

    /// Validate one already-fetched manifest
    pub async fn process_workspace(
        &self,
        folder_name: &str,
        raw: &Value,
    ) -> std::result::Result<Value, Rejection> {
        self.pipeline.process_workspace(folder_name, raw).await
    }

    /// Process every workspace folder of one repository.
    ///
    /// Returns `None` when no workspace survives or the repository has no
    /// valid pages URL.
    pub async fn process_repository(&self, listing: &RepositoryListing) -> Option<CatalogEntry> {
        let repository = listing.full_name.as_str();

        let folders = match self.source.workspace_folders(repository).await {
            Ok(folders) => folders,
            Err(e) => {
                info!(
                    "Skipping {}: no '{}' folder ({})",
                    repository,
                    crate::discovery::WORKSPACES_DIR,
                    e
                );
                return None;
            }
        };
        if folders.is_empty() {
            info!("Skipping {}: workspaces folder has no subfolders", repository);
            return None;
        }

        let mut workspaces = BTreeMap::new();

        for folder in folders {
            let body = match self.source.fetch_manifest(repository, &folder).await {
                Ok(body) => body,
                Err(e) => {
                    info!("Skipping subfolder {}: {}", folder.name, e);
                    continue;
                }
            };

            match self.pipeline.process_manifest_text(&folder.name, &body).await {
                Ok(projected) => {
                    workspaces.insert(folder.name, projected);
                }
                Err(rejection) => {
                    info!("Skipping subfolder {} of {}: {}", folder.name, repository, rejection);
                }
            }
        }

        info!("Found {} workspaces in {}", workspaces.len(), repository);
        if workspaces.is_empty() {
            return None;
        }

        match self.source.pages_url(repository).await {
            Ok(Some(url)) if is_valid_http_url(&url) => Some(CatalogEntry::new(
                url,
                listing.stars,
                listing.last_commit.clone(),
                workspaces,
            )),
            Ok(Some(url)) => {
                warn!("Skipping {}: invalid GitHub Pages URL {:?}", repository, url);
                None
            }
            Ok(None) => {
                info!("Skipping {}: no GitHub Pages URL", repository);
                None
            }
            Err(e) => {
                warn!("Skipping {}: failed to fetch GitHub Pages URL: {}", repository, e);
                None
            }
        }
    }

    /// Discover, validate and assemble the full catalog.
    ///
    /// Only fatal errors (credentials, configuration) escape; everything
    /// else drops the affected item.
    pub async fn run(&self) -> Result<HarvestReport> {
        self.pipeline.stats().reset();

        let listings = match self.source.search().await {
            Ok(listings) => listings,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Repository search via {} failed: {}", self.source.name(), e);
                Vec::new()
            }
        };

        let mut catalog = Catalog::new();
        for listing in &listings {
            info!("Parsing repository: {}", listing.full_name);
            if let Some(entry) = self.process_repository(listing).await {
                catalog.insert(listing.full_name.clone(), entry);
            }
        }

        let stats = self.pipeline.stats().snapshot();
        info!(
            "Harvest complete: {} of {} repositories published, {} workspaces ({:?})",
            catalog.len(),
            listings.len(),
            catalog.workspace_count(),
            stats
        );

        Ok(HarvestReport {
            generated: chrono::Utc::now().to_rfc3339(),
            repositories: listings.into_iter().map(|l| l.full_name).collect(),
            catalog,
            stats,
        })
    }
}
