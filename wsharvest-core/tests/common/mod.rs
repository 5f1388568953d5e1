//! Shared helpers for integration tests
//!
//! Provides in-memory stand-ins for the image inspector and the repository
//! source, fixture loading, and one-time tracing setup.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde_json::Value;
use wsharvest_core::discovery::{RepositoryListing, RepositorySource, WorkspaceFolder};
use wsharvest_core::error::{HarvestError, Result};
use wsharvest_core::inspect::ImageInspector;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/workspaces")
}

pub fn fixture_text(name: &str) -> String {
    std::fs::read_to_string(fixtures_path().join(name))
        .unwrap_or_else(|e| panic!("missing fixture {name}: {e}"))
}

pub fn fixture(name: &str) -> Value {
    serde_json::from_str(&fixture_text(name)).unwrap()
}

/// Inspector answering from a fixed set of references
#[derive(Default)]
pub struct MockInspector {
    /// `None` accepts every reference
    pullable: Option<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockInspector {
    pub fn accepting_all() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accepting(refs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pullable: Some(refs.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageInspector for MockInspector {
    async fn inspect(&self, reference: &str) -> Result<()> {
        self.calls.lock().unwrap().push(reference.to_string());
        match &self.pullable {
            None => Ok(()),
            Some(set) if set.contains(reference) => Ok(()),
            Some(_) => Err(HarvestError::Inspect(format!(
                "manifest unknown: {reference}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// One repository served by [`MockSource`]
#[derive(Default, Clone)]
pub struct MockRepository {
    pub stars: u64,
    pub last_commit: String,
    /// `None` simulates a repository without a workspaces folder
    pub folders: Option<Vec<(String, Option<String>)>>,
    pub pages_url: Option<String>,
}

impl MockRepository {
    pub fn new(stars: u64) -> Self {
        Self {
            stars,
            last_commit: "2025-06-01T12:00:00Z".to_string(),
            folders: Some(Vec::new()),
            pages_url: None,
        }
    }

    /// Add a folder whose manifest body is `body`
    pub fn folder(mut self, name: &str, body: &str) -> Self {
        self.folders
            .get_or_insert_with(Vec::new)
            .push((name.to_string(), Some(body.to_string())));
        self
    }

    /// Add a folder without a manifest file
    pub fn empty_folder(mut self, name: &str) -> Self {
        self.folders
            .get_or_insert_with(Vec::new)
            .push((name.to_string(), None));
        self
    }

    pub fn pages(mut self, url: &str) -> Self {
        self.pages_url = Some(url.to_string());
        self
    }

    pub fn without_workspaces_dir(mut self) -> Self {
        self.folders = None;
        self
    }
}

/// In-memory repository source
#[derive(Default)]
pub struct MockSource {
    order: Vec<String>,
    repositories: HashMap<String, MockRepository>,
    fail_search: Option<fn() -> HarvestError>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository(mut self, full_name: &str, repository: MockRepository) -> Self {
        self.order.push(full_name.to_string());
        self.repositories.insert(full_name.to_string(), repository);
        self
    }

    /// Make `search` fail with the error built by `make_error`
    pub fn failing_search(mut self, make_error: fn() -> HarvestError) -> Self {
        self.fail_search = Some(make_error);
        self
    }

    fn get(&self, full_name: &str) -> Result<&MockRepository> {
        self.repositories
            .get(full_name)
            .ok_or_else(|| HarvestError::NotFound(full_name.to_string()))
    }
}

#[async_trait]
impl RepositorySource for MockSource {
    async fn search(&self) -> Result<Vec<RepositoryListing>> {
        if let Some(make_error) = self.fail_search {
            return Err(make_error());
        }
        Ok(self
            .order
            .iter()
            .map(|name| {
                let repo = &self.repositories[name];
                RepositoryListing::new(name.clone(), repo.stars, repo.last_commit.clone())
            })
            .collect())
    }

    async fn workspace_folders(&self, repository: &str) -> Result<Vec<WorkspaceFolder>> {
        let repo = self.get(repository)?;
        let folders = repo
            .folders
            .as_ref()
            .ok_or_else(|| HarvestError::NotFound(format!("{repository}/workspaces")))?;
        Ok(folders
            .iter()
            .map(|(name, _)| WorkspaceFolder::new(name.clone(), format!("{repository}/{name}")))
            .collect())
    }

    async fn fetch_manifest(&self, repository: &str, folder: &WorkspaceFolder) -> Result<String> {
        let repo = self.get(repository)?;
        repo.folders
            .as_ref()
            .and_then(|folders| folders.iter().find(|(name, _)| *name == folder.name))
            .and_then(|(_, body)| body.clone())
            .ok_or_else(|| HarvestError::NotFound(format!("{}/workspace.json", folder.location)))
    }

    async fn pages_url(&self, repository: &str) -> Result<Option<String>> {
        Ok(self.get(repository)?.pages_url.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
