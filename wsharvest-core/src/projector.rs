//! Projection of verified results back onto the author's document
//!
//! The catalog publishes manifests in the shape their authors wrote them.
//! Legacy documents are filtered by version string, current documents by
//! entry image; every other field is copied through.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::Rejection;
use crate::manifest::{CanonicalManifest, ManifestForm};

/// Filter `original` down to the entries present in `verified`.
///
/// Fails with [`Rejection::NothingVerified`] when nothing was verified or
/// nothing in the original matches. `original` is never modified.
pub fn project_original(
    original: &Value,
    verified: Option<&CanonicalManifest>,
) -> Result<Value, Rejection> {
    let verified = match verified {
        Some(v) if !v.compatibility.is_empty() => v,
        _ => return Err(Rejection::NothingVerified),
    };

    let form = ManifestForm::detect(original)?;
    let mut projected = original.clone();
    let compatibility = match projected.get_mut("compatibility") {
        Some(Value::Array(items)) => items,
        _ => return Err(Rejection::NothingVerified),
    };

    match form {
        ManifestForm::Legacy => {
            let versions: HashSet<&str> = verified
                .entries()
                .filter_map(|e| e.version.as_deref())
                .collect();
            compatibility.retain(|item| item.as_str().is_some_and(|v| versions.contains(v)));
        }
        ManifestForm::Current => {
            let images: HashSet<&str> = verified
                .entries()
                .filter_map(|e| e.image.as_deref())
                .collect();
            compatibility.retain(|item| {
                item.get("image")
                    .and_then(Value::as_str)
                    .is_some_and(|image| images.contains(image))
            });
        }
    }

    if compatibility.is_empty() {
        return Err(Rejection::NothingVerified);
    }

    Ok(projected)
}
