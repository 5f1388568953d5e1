//! Repository and manifest discovery
//!
//! A [`RepositorySource`] finds candidate repositories, lists the workspace
//! folders inside each one, and fetches their `workspace.json`. The pipeline
//! only sees this trait; [`github::GitHubSource`] is the production
//! implementation.

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "github")]
pub use github::GitHubSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Manifest file expected in every workspace folder
pub const MANIFEST_FILE_NAME: &str = "workspace.json";

/// Directory holding workspace folders at the repository root
pub const WORKSPACES_DIR: &str = "workspaces";

/// A repository returned by search, with its display metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryListing {
    /// `owner/name`
    pub full_name: String,

    pub stars: u64,

    /// Last push timestamp, opaque
    pub last_commit: String,
}

impl RepositoryListing {
    pub fn new(full_name: impl Into<String>, stars: u64, last_commit: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            stars,
            last_commit: last_commit.into(),
        }
    }
}

/// One folder under `workspaces/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    /// Folder name, unique within a repository
    pub name: String,

    /// Source-specific locator for the folder contents
    pub location: String,
}

impl WorkspaceFolder {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// Source of repositories and their workspace manifests
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Candidate repositories in discovery order
    async fn search(&self) -> Result<Vec<RepositoryListing>>;

    /// Workspace folders of `repository`, in listing order
    async fn workspace_folders(&self, repository: &str) -> Result<Vec<WorkspaceFolder>>;

    /// Raw body of the folder's manifest file
    async fn fetch_manifest(&self, repository: &str, folder: &WorkspaceFolder) -> Result<String>;

    /// Published pages URL of `repository`, unvalidated
    async fn pages_url(&self, repository: &str) -> Result<Option<String>>;

    /// Source identifier for logging
    fn name(&self) -> &'static str;
}
