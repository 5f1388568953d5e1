//! wsharvest library exports
//!
//! Builds a vetted catalog of community workspace manifests discovered in
//! public repositories. Manifests are untrusted: each one is screened for
//! disallowed content, normalized across both schema generations, checked
//! for pullable images under a hard entry cap, and projected back to the
//! author's original shape.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod inspect;
pub mod manifest;
pub mod pipeline;
pub mod projector;
pub mod pullability;
pub mod stats;

pub use catalog::{Catalog, CatalogEntry, CatalogWriter, HarvestReport};
pub use config::HarvestConfig;
pub use error::{HarvestError, Rejection};
pub use pipeline::{Harvester, WorkspacePipeline};
pub use stats::{HarvestStats, StatsSnapshot};
