//! Harvest run configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. CLI flags (applied by the binary after loading)
//! 2. A YAML file passed with `--config`
//! 3. Environment: `DEBUG` and the credential variable named by `token_env`
//! 4. Built-in defaults
//!
//! ```yaml
//! search_query: 'in:readme sort:updated "KASM-REGISTRY-DISCOVERY-IDENTIFIER"'
//! max_compatibility_entries: 10
//! image_prefix_filters: ["kasmweb/"]
//! inspect_timeout_seconds: 10
//! output_dir: generated
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::filter::IMAGE_NAME_PREFIX_FILTERS;
use crate::inspect::DEFAULT_INSPECT_COMMAND;
use crate::pullability::{DEFAULT_INSPECT_CONCURRENCY, MAX_COMPATIBILITY_ENTRIES};

/// Marker string community repositories put in their README
pub const DEFAULT_SEARCH_QUERY: &str =
    r#"in:readme sort:updated -user:kasmtech "KASM-REGISTRY-DISCOVERY-IDENTIFIER""#;

/// Environment variable holding the GitHub token
pub const DEFAULT_TOKEN_ENV: &str = "GH_PAT";

/// Environment variable toggling debug-sized runs
pub const DEBUG_ENV: &str = "DEBUG";

/// Discovery limits applied in debug mode
const DEBUG_PER_PAGE: u32 = 5;
const DEBUG_MAX_PAGES: u32 = 1;

/// Top-level harvest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// GitHub repository search query
    #[serde(default = "default_search_query")]
    pub search_query: String,

    /// Results per search page
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Maximum number of search pages
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Pause before every API request, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    /// Environment variable name containing the GitHub token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Debug mode shrinks discovery to a single small page.
    /// Defaults to the `DEBUG` environment variable (on unless set otherwise).
    #[serde(default)]
    pub debug: Option<bool>,

    /// Image inspection tool
    #[serde(default = "default_inspect_command")]
    pub inspect_command: String,

    /// Timeout for one image inspection in seconds
    #[serde(default = "default_inspect_timeout")]
    pub inspect_timeout_seconds: u64,

    /// Concurrent inspections per manifest
    #[serde(default = "default_inspect_concurrency")]
    pub inspect_concurrency: usize,

    /// Cap on compatibility entries considered per manifest
    #[serde(default = "default_max_compatibility_entries")]
    pub max_compatibility_entries: usize,

    /// Reserved image reference prefixes
    #[serde(default = "default_image_prefix_filters")]
    pub image_prefix_filters: Vec<String>,

    /// Extra disallowed terms, one per line
    #[serde(default)]
    pub disallowed_terms_file: Option<PathBuf>,

    /// Where result files are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            search_query: default_search_query(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            request_delay_ms: default_request_delay_ms(),
            http_timeout_seconds: default_http_timeout(),
            token_env: default_token_env(),
            debug: None,
            inspect_command: default_inspect_command(),
            inspect_timeout_seconds: default_inspect_timeout(),
            inspect_concurrency: default_inspect_concurrency(),
            max_compatibility_entries: default_max_compatibility_entries(),
            image_prefix_filters: default_image_prefix_filters(),
            disallowed_terms_file: None,
            output_dir: default_output_dir(),
        }
    }
}

fn default_search_query() -> String {
    DEFAULT_SEARCH_QUERY.to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    100
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_http_timeout() -> u64 {
    30
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_inspect_command() -> String {
    DEFAULT_INSPECT_COMMAND.to_string()
}

fn default_inspect_timeout() -> u64 {
    10
}

fn default_inspect_concurrency() -> usize {
    DEFAULT_INSPECT_CONCURRENCY
}

fn default_max_compatibility_entries() -> usize {
    MAX_COMPATIBILITY_ENTRIES
}

fn default_image_prefix_filters() -> Vec<String> {
    IMAGE_NAME_PREFIX_FILTERS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

/// Interpret a `DEBUG`-style flag; only an explicit "true" enables it
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl HarvestConfig {
    /// Load from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
            .map_err(|e| HarvestError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Parse from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                debug!("Loading harvest config from {}", path.display());
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.search_query.trim().is_empty() {
            return Err(HarvestError::Config("search_query must not be empty".into()));
        }
        if self.per_page == 0 || self.per_page > 100 {
            return Err(HarvestError::Config(format!(
                "per_page must be between 1 and 100, got {}",
                self.per_page
            )));
        }
        if self.max_compatibility_entries == 0 {
            return Err(HarvestError::Config(
                "max_compatibility_entries must be at least 1".into(),
            ));
        }
        if self.inspect_timeout_seconds == 0 {
            return Err(HarvestError::Config(
                "inspect_timeout_seconds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether this is a debug-sized run
    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or_else(|| {
            std::env::var(DEBUG_ENV)
                .map(|v| parse_flag(&v))
                .unwrap_or(true)
        })
    }

    /// Per-page size after debug limits
    pub fn effective_per_page(&self) -> u32 {
        if self.debug_enabled() {
            self.per_page.min(DEBUG_PER_PAGE)
        } else {
            self.per_page
        }
    }

    /// Page cap after debug limits
    pub fn effective_max_pages(&self) -> u32 {
        if self.debug_enabled() {
            self.max_pages.min(DEBUG_MAX_PAGES)
        } else {
            self.max_pages
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_seconds)
    }

    /// Read the discovery credential; its absence is fatal for a run
    pub fn resolve_token(&self) -> Result<String> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(HarvestError::MissingCredential(self.token_env.clone())),
        }
    }
}
