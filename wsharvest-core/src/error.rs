//! Error and rejection types
//!
//! Two families live here. [`HarvestError`] covers infrastructure failures
//! (credentials, HTTP, subprocesses, files). [`Rejection`] is the expected,
//! per-workspace outcome of a pipeline stage refusing a manifest; it is
//! never fatal and always carries a reason for the log.

use std::fmt;

use thiserror::Error;

use crate::stats::{Counter, HarvestStats};

/// Infrastructure errors raised by collaborators and glue code
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("{0} environment variable not set. Export it or add it to your environment before running")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Image inspection error: {0}")]
    Inspect(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    YamlSerialization(#[from] serde_yaml_ng::Error),
}

impl HarvestError {
    /// Whether this error must stop the whole run instead of a single item
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarvestError::MissingCredential(_) | HarvestError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// Why a workspace manifest was dropped from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Wrong JSON type, non-list compatibility, or an unstructured entry
    MalformedInput(String),

    /// A checked field contains a disallowed term
    ContentRejected { field: &'static str },

    /// No compatibility entry references a retrievable image
    UnreachableImage,

    /// Verification succeeded but nothing in the original document matched
    NothingVerified,
}

impl Rejection {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Rejection::MalformedInput(reason.into())
    }

    /// The statistics counter this rejection is accounted under, if any.
    ///
    /// Content rejections are counted by the content filter itself at the
    /// moment of detection, so they map to nothing here.
    pub fn counter(&self) -> Option<Counter> {
        match self {
            Rejection::MalformedInput(_) => Some(Counter::InvalidFormat),
            Rejection::UnreachableImage => Some(Counter::UnreachableImage),
            Rejection::ContentRejected { .. } | Rejection::NothingVerified => None,
        }
    }

    /// Record this rejection against the run statistics
    pub fn record(&self, stats: &HarvestStats) {
        if let Some(counter) = self.counter() {
            stats.increment(counter);
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MalformedInput(reason) => write!(f, "invalid workspace.json format: {reason}"),
            Rejection::ContentRejected { field } => {
                write!(f, "disallowed content detected in {field}")
            }
            Rejection::UnreachableImage => write!(f, "no pullable images found in workspace.json"),
            Rejection::NothingVerified => {
                write!(f, "no compatibility entries left after filtering")
            }
        }
    }
}

impl std::error::Error for Rejection {}
