//! Image pullability verification
//!
//! Keeps only the compatibility entries whose image can actually be
//! retrieved. The entry count is attacker-controlled, so the list is capped
//! before any inspection runs.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::Rejection;
use crate::filter::{normalize_registry, ImageFilter};
use crate::inspect::ImageInspector;
use crate::manifest::{json_type, CanonicalManifest, CompatibilityEntry, CompatibilityItem};
use crate::stats::{Counter, HarvestStats};

/// Upper bound on compatibility entries inspected per manifest
pub const MAX_COMPATIBILITY_ENTRIES: usize = 10;

/// Default number of concurrent inspections per manifest
pub const DEFAULT_INSPECT_CONCURRENCY: usize = 4;

/// Filters canonical manifests down to retrievable images
#[derive(Clone)]
pub struct PullabilityChecker {
    inspector: Arc<dyn ImageInspector>,
    image_filter: ImageFilter,
    max_entries: usize,
    concurrency: usize,
}

impl PullabilityChecker {
    pub fn new(inspector: Arc<dyn ImageInspector>) -> Self {
        Self {
            inspector,
            image_filter: ImageFilter::default(),
            max_entries: MAX_COMPATIBILITY_ENTRIES,
            concurrency: DEFAULT_INSPECT_CONCURRENCY,
        }
    }

    pub fn with_image_filter(mut self, image_filter: ImageFilter) -> Self {
        self.image_filter = image_filter;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Return a copy of `manifest` holding only pullable entries.
    ///
    /// Fails closed: one unstructured entry rejects the whole manifest.
    /// Increments `truncated_compatibility_workspaces` once when the cap
    /// applies.
    pub async fn filter_pullable(
        &self,
        manifest: &CanonicalManifest,
        stats: &HarvestStats,
    ) -> Result<CanonicalManifest, Rejection> {
        let registry = manifest
            .docker_registry
            .as_deref()
            .map(normalize_registry)
            .filter(|r| !r.is_empty());

        let mut entries = Vec::with_capacity(manifest.compatibility.len());
        for item in &manifest.compatibility {
            match item {
                CompatibilityItem::Entry(entry) => entries.push(entry),
                CompatibilityItem::Unstructured(value) => {
                    return Err(Rejection::malformed(format!(
                        "compatibility entry is not an object: {}",
                        json_type(value)
                    )));
                }
            }
        }

        if entries.len() > self.max_entries {
            let dropped: Vec<&str> = entries[self.max_entries..]
                .iter()
                .map(|e| e.version.as_deref().unwrap_or("<unversioned>"))
                .collect();
            warn!(
                "Compatibility list has {} entries; keeping the first {} and dropping versions {:?}",
                entries.len(),
                self.max_entries,
                dropped
            );
            stats.increment(Counter::TruncatedCompatibility);
            entries.truncate(self.max_entries);
        }

        let registry = registry.as_deref();
        let verdicts: Vec<bool> = stream::iter(entries.iter().copied())
            .map(|entry| self.verify_entry(entry, registry))
            .buffered(self.concurrency)
            .collect()
            .await;

        let pullable: Vec<CompatibilityEntry> = entries
            .into_iter()
            .zip(verdicts)
            .filter_map(|(entry, ok)| ok.then(|| entry.clone()))
            .collect();

        if pullable.is_empty() {
            return Err(Rejection::UnreachableImage);
        }

        Ok(manifest.with_compatibility(pullable))
    }

    async fn verify_entry(&self, entry: &CompatibilityEntry, registry: Option<&str>) -> bool {
        let image = match entry.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => image,
            _ => {
                debug!("Compatibility entry {:?} has no image", entry.version);
                return false;
            }
        };

        if self.image_filter.should_skip(Some(image), registry) {
            info!("Skipping image {} (reserved namespace)", image);
            return false;
        }

        let pullable = self.is_pullable(image, registry).await;
        if pullable {
            info!("Image {} is pullable", image);
        } else {
            info!("Image {} is not pullable", image);
        }
        pullable
    }

    /// Inspect `image`, retrying once qualified with `registry` on failure
    async fn is_pullable(&self, image: &str, registry: Option<&str>) -> bool {
        let err = match self.inspector.inspect(image).await {
            Ok(()) => return true,
            Err(e) => e,
        };
        debug!("Error inspecting image {} via {}: {}", image, self.inspector.name(), err);

        let Some(registry) = registry else {
            return false;
        };
        if image.starts_with(&format!("{registry}/")) {
            return false;
        }

        let qualified = format!("{registry}/{image}");
        debug!("Retrying with registry prefix: {}", qualified);
        match self.inspector.inspect(&qualified).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Error inspecting image {}: {}", qualified, e);
                false
            }
        }
    }
}
