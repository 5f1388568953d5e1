//! Workspace manifest model (workspace.json)
//!
//! Two generations of the manifest exist in the wild. They differ only in
//! `compatibility`:
//!
//! ```text
//! Legacy:  { "name": "org/img:tag", "uncompressed_size_mb": 500,
//!            "compatibility": ["1.15.x", "1.16.x"] }
//! Current: { "compatibility": [ { "version": "1.15.x", "image": "org/img:1.15",
//!                                 "uncompressed_size_mb": 500 } ] }
//! ```
//!
//! Every filtering stage works on [`CanonicalManifest`]. Only the projector
//! looks at the original document again, using [`ManifestForm`] to answer in
//! the author's idiom.

mod normalize;

pub use normalize::{normalize, NormalizedWorkspaces};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Rejection;

/// Which manifest generation a document uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestForm {
    /// `compatibility` is a list of version strings
    Legacy,
    /// `compatibility` is a list of entry objects (or absent/empty)
    Current,
}

impl ManifestForm {
    /// Classify a raw manifest document
    pub fn detect(manifest: &Value) -> Result<Self, Rejection> {
        let object = manifest.as_object().ok_or_else(|| {
            Rejection::malformed(format!("expected a JSON object, got {}", json_type(manifest)))
        })?;

        match object.get("compatibility") {
            None | Some(Value::Null) => Ok(ManifestForm::Current),
            Some(Value::Array(items)) => {
                if !items.is_empty() && items.iter().all(Value::is_string) {
                    Ok(ManifestForm::Legacy)
                } else {
                    Ok(ManifestForm::Current)
                }
            }
            Some(other) => Err(Rejection::malformed(format!(
                "compatibility is not a list: {}",
                json_type(other)
            ))),
        }
    }
}

/// Human name of a JSON value's type, for rejection messages
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Take `key` out of `fields` when it holds a string.
///
/// Values of any other type stay in `fields` so they are carried through.
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(_)) => match fields.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// One image a workspace can run as
///
/// Built from any JSON object. `version` and `image` are read only when
/// they are strings; an entry without a string image is never verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Carried as written; never interpreted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncompressed_size_mb: Option<Value>,

    /// Author-defined keys carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompatibilityEntry {
    pub fn new(version: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            image: Some(image.into()),
            uncompressed_size_mb: None,
            extra: Map::new(),
        }
    }

    pub fn with_size(mut self, size_mb: impl Into<Value>) -> Self {
        self.uncompressed_size_mb = Some(size_mb.into());
        self
    }

    /// Read an entry object without rejecting unexpected field types
    pub fn from_map(mut fields: Map<String, Value>) -> Self {
        let version = take_string(&mut fields, "version");
        let image = take_string(&mut fields, "image");
        let uncompressed_size_mb = fields
            .remove("uncompressed_size_mb")
            .filter(|v| !v.is_null());
        Self {
            version,
            image,
            uncompressed_size_mb,
            extra: fields,
        }
    }
}

impl<'de> Deserialize<'de> for CompatibilityEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(<D::Error as serde::de::Error>::custom(format!(
                "compatibility entry must be an object, got {}",
                json_type(&other)
            ))),
        }
    }
}

/// A compatibility slot as found in a manifest
///
/// Every JSON object is an `Entry`. Anything else is kept as `Unstructured`
/// so the pullability stage can reject the manifest instead of silently
/// dropping it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompatibilityItem {
    Entry(CompatibilityEntry),
    Unstructured(Value),
}

impl CompatibilityItem {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => CompatibilityItem::Entry(CompatibilityEntry::from_map(fields)),
            other => CompatibilityItem::Unstructured(other),
        }
    }

    pub fn as_entry(&self) -> Option<&CompatibilityEntry> {
        match self {
            CompatibilityItem::Entry(entry) => Some(entry),
            CompatibilityItem::Unstructured(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for CompatibilityItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl From<CompatibilityEntry> for CompatibilityItem {
    fn from(entry: CompatibilityEntry) -> Self {
        CompatibilityItem::Entry(entry)
    }
}

/// Uniform in-memory manifest shape used by all filtering logic
///
/// Display fields are optional and read leniently: a wrong-typed value is
/// left in `extra` rather than failing the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Registry host, scheme and trailing slash stripped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_registry: Option<String>,

    pub compatibility: Vec<CompatibilityItem>,

    /// Remaining top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalManifest {
    /// Read a manifest object without rejecting unexpected field types
    pub fn from_map(mut fields: Map<String, Value>) -> Self {
        let name = take_string(&mut fields, "name");
        let friendly_name = take_string(&mut fields, "friendly_name");
        let description = take_string(&mut fields, "description");
        let docker_registry = take_string(&mut fields, "docker_registry");

        let categories = match fields.get("categories") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        };
        if matches!(fields.get("categories"), Some(Value::Array(_) | Value::String(_))) {
            fields.remove("categories");
        }

        let compatibility = match fields.remove("compatibility") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(CompatibilityItem::from_value)
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![CompatibilityItem::Unstructured(other)],
        };

        Self {
            name,
            friendly_name,
            description,
            categories,
            docker_registry,
            compatibility,
            extra: fields,
        }
    }

    /// Structured entries, skipping anything unstructured
    pub fn entries(&self) -> impl Iterator<Item = &CompatibilityEntry> {
        self.compatibility.iter().filter_map(CompatibilityItem::as_entry)
    }

    /// A copy of this manifest with `compatibility` replaced
    pub fn with_compatibility(&self, entries: Vec<CompatibilityEntry>) -> Self {
        Self {
            compatibility: entries.into_iter().map(CompatibilityItem::Entry).collect(),
            ..self.clone()
        }
    }
}

impl<'de> Deserialize<'de> for CanonicalManifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(<D::Error as serde::de::Error>::custom(format!(
                "manifest must be an object, got {}",
                json_type(&other)
            ))),
        }
    }
}
