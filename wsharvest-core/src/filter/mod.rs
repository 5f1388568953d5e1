//! Pure predicates applied to untrusted manifests
//!
//! - [`url`]: navigable HTTP(S) link validation
//! - [`content`]: disallowed-term screening
//! - [`image`]: reserved image namespace deny-list

pub mod content;
pub mod image;
pub mod url;

pub use content::{CensorOracle, ContentFilter, DisallowedTerms, TermOracle, WordList};
pub use image::{normalize_registry, should_skip_image, ImageFilter, IMAGE_NAME_PREFIX_FILTERS};
pub use url::is_valid_http_url;
