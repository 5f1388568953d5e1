//! GitHub-backed repository source
//!
//! Uses the REST API: repository search for discovery, the contents API for
//! `workspaces/*/workspace.json`, and the pages API for the published URL.
//! Requests are spaced by a fixed delay to stay under the rate limit.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    RepositoryListing, RepositorySource, WorkspaceFolder, MANIFEST_FILE_NAME, WORKSPACES_DIR,
};
use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};

/// Default API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

/// GitHub REST client
pub struct GitHubSource {
    client: reqwest::Client,
    api_base: String,
    search_query: String,
    per_page: u32,
    max_pages: u32,
    request_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    full_name: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    pushed_at: Option<String>,
}

impl From<SearchItem> for RepositoryListing {
    fn from(item: SearchItem) -> Self {
        RepositoryListing {
            full_name: item.full_name,
            stars: item.stargazers_count,
            last_commit: item.pushed_at.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    html_url: Option<String>,
}

impl GitHubSource {
    /// Build a client from run configuration.
    ///
    /// Fails with [`HarvestError::MissingCredential`] when the token
    /// variable is unset.
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        let token = config.resolve_token()?;
        Self::new(
            DEFAULT_API_BASE,
            &token,
            config.search_query.clone(),
            config.effective_per_page(),
            config.effective_max_pages(),
            config.request_delay(),
            config.http_timeout(),
        )
    }

    pub fn new(
        api_base: &str,
        token: &str,
        search_query: String,
        per_page: u32,
        max_pages: u32,
        request_delay: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HarvestError::Config("GitHub token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent(concat!("wsharvest/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            search_query,
            per_page,
            max_pages,
            request_delay,
        })
    }

    fn contents_url(&self, repository: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, repository, WORKSPACES_DIR)
    }

    fn pages_api_url(&self, repository: &str) -> String {
        format!("{}/repos/{}/pages", self.api_base, repository)
    }

    /// GET with rate-limit spacing; non-success statuses become errors
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        tokio::time::sleep(self.request_delay).await;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| HarvestError::Http(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(HarvestError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(HarvestError::Http(format!("HTTP {status} from {url}")));
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get(url, query).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HarvestError::Http(format!("unexpected response from {url}: {e}")))
    }
}

#[async_trait]
impl RepositorySource for GitHubSource {
    async fn search(&self) -> Result<Vec<RepositoryListing>> {
        info!("Searching for repositories matching query: {}", self.search_query);
        let url = format!("{}/search/repositories", self.api_base);
        let mut results = Vec::new();

        for page in 1..=self.max_pages {
            let query = [
                ("q", self.search_query.clone()),
                ("per_page", self.per_page.to_string()),
                ("page", page.to_string()),
            ];

            let response: SearchResponse = match self.get_json(&url, &query).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Error fetching page {}: {}", page, e);
                    break;
                }
            };

            if response.items.is_empty() {
                break;
            }
            results.extend(response.items.into_iter().map(RepositoryListing::from));
        }

        info!("Total repositories found: {}", results.len());
        Ok(results)
    }

    async fn workspace_folders(&self, repository: &str) -> Result<Vec<WorkspaceFolder>> {
        let items: Vec<ContentItem> = self.get_json(&self.contents_url(repository), &[]).await?;

        let folders: Vec<WorkspaceFolder> = items
            .into_iter()
            .filter(|item| item.kind == "dir")
            .map(|item| WorkspaceFolder::new(item.name, item.url))
            .collect();

        debug!("{} has {} workspace folders", repository, folders.len());
        Ok(folders)
    }

    async fn fetch_manifest(&self, repository: &str, folder: &WorkspaceFolder) -> Result<String> {
        let items: Vec<ContentItem> = self.get_json(&folder.location, &[]).await?;

        let download_url = items
            .into_iter()
            .find(|item| item.name == MANIFEST_FILE_NAME)
            .and_then(|item| item.download_url)
            .ok_or_else(|| {
                HarvestError::NotFound(format!(
                    "{repository}/{WORKSPACES_DIR}/{}/{MANIFEST_FILE_NAME}",
                    folder.name
                ))
            })?;

        let response = self.get(&download_url, &[]).await?;
        response
            .text()
            .await
            .map_err(|e| HarvestError::Http(format!("failed to read {download_url}: {e}")))
    }

    async fn pages_url(&self, repository: &str) -> Result<Option<String>> {
        match self
            .get_json::<PagesResponse>(&self.pages_api_url(repository), &[])
            .await
        {
            Ok(pages) => Ok(pages.html_url),
            Err(HarvestError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "github"
    }
}
