//! Conversion of either manifest generation into [`CanonicalManifest`]

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::{CanonicalManifest, CompatibilityEntry, CompatibilityItem, ManifestForm};
use crate::error::Rejection;
use crate::filter::normalize_registry;

/// Normalized manifests keyed by workspace folder name
pub type NormalizedWorkspaces = BTreeMap<String, CanonicalManifest>;

/// Normalize a raw manifest and key the result by `folder_name`.
///
/// Legacy manifests fan their top-level `name` and `uncompressed_size_mb`
/// out into one entry per version string, in version order. Current
/// manifests keep their entry list as is. An empty object is valid and
/// yields an empty manifest.
pub fn normalize(raw: &Value, folder_name: &str) -> Result<NormalizedWorkspaces, Rejection> {
    let form = ManifestForm::detect(raw)?;

    let mut fields = raw.as_object().cloned().unwrap_or_default();
    let compatibility = fields.remove("compatibility");

    let mut manifest = CanonicalManifest::from_map(fields);

    if let Some(registry) = manifest.docker_registry.take() {
        manifest.docker_registry = Some(normalize_registry(&registry));
    }

    let items = match compatibility {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    manifest.compatibility = match form {
        ManifestForm::Legacy => {
            let image = manifest.name.clone();
            let size = manifest
                .extra
                .get("uncompressed_size_mb")
                .filter(|v| !v.is_null())
                .cloned();

            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(version) => Some(CompatibilityItem::Entry(CompatibilityEntry {
                        version: Some(version),
                        image: image.clone(),
                        uncompressed_size_mb: size.clone(),
                        extra: Default::default(),
                    })),
                    _ => None,
                })
                .collect()
        }
        ManifestForm::Current => items.into_iter().map(CompatibilityItem::from_value).collect(),
    };

    debug!(
        "Normalized {} ({:?} form, {} compatibility entries)",
        folder_name,
        form,
        manifest.compatibility.len()
    );

    let mut out = NormalizedWorkspaces::new();
    out.insert(folder_name.to_string(), manifest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy() -> Value {
        json!({
            "name": "myregistry/test-image:latest",
            "friendly_name": "Test Workspace",
            "description": "Old format workspace",
            "categories": ["Development"],
            "docker_registry": "https://registry.example.com/",
            "uncompressed_size_mb": 500,
            "compatibility": ["1.15.x", "1.16.x", "1.17.x"]
        })
    }

    #[test]
    fn test_legacy_fans_out_image_and_size_in_order() {
        let result = normalize(&legacy(), "test-workspace").unwrap();
        let workspace = &result["test-workspace"];

        let versions: Vec<_> = workspace
            .entries()
            .map(|e| e.version.clone().unwrap())
            .collect();
        assert_eq!(versions, vec!["1.15.x", "1.16.x", "1.17.x"]);

        for entry in workspace.entries() {
            assert_eq!(entry.image.as_deref(), Some("myregistry/test-image:latest"));
            assert_eq!(entry.uncompressed_size_mb, Some(json!(500)));
        }
    }

    #[test]
    fn test_current_form_passes_through() {
        let raw = json!({
            "docker_registry": "registry.example.com",
            "compatibility": [
                {"version": "1.15.x", "image": "a/b:1.15", "uncompressed_size_mb": 500, "gpu": true},
                {"version": "1.16.x", "image": "a/b:1.16", "uncompressed_size_mb": 510}
            ]
        });

        let result = normalize(&raw, "ws").unwrap();
        let workspace = &result["ws"];
        assert_eq!(workspace.compatibility.len(), 2);
        let first = workspace.compatibility[0].as_entry().unwrap();
        assert_eq!(first.image.as_deref(), Some("a/b:1.15"));
        assert_eq!(first.extra["gpu"], true);
    }

    #[test]
    fn test_registry_is_normalized() {
        let result = normalize(&legacy(), "ws").unwrap();
        assert_eq!(
            result["ws"].docker_registry.as_deref(),
            Some("registry.example.com")
        );
    }

    #[test]
    fn test_empty_object_is_valid() {
        let result = normalize(&json!({}), "test-workspace").unwrap();
        assert!(result.contains_key("test-workspace"));
        assert!(result["test-workspace"].compatibility.is_empty());
    }

    #[test]
    fn test_non_objects_fail() {
        assert!(normalize(&json!("not a dict"), "ws").is_err());
        assert!(normalize(&json!(["a"]), "ws").is_err());
        assert!(normalize(&Value::Null, "ws").is_err());
    }

    #[test]
    fn test_unstructured_entries_survive_normalization() {
        let raw = json!({"compatibility": [{"version": "1", "image": "a/b:1"}, 7]});
        let result = normalize(&raw, "ws").unwrap();
        assert_eq!(
            result["ws"].compatibility[1],
            CompatibilityItem::Unstructured(json!(7))
        );
    }

    #[test]
    fn test_input_is_not_mutated() {
        let raw = legacy();
        let before = raw.clone();
        let _ = normalize(&raw, "ws").unwrap();
        assert_eq!(raw, before);
    }

    #[test]
    fn test_wrong_typed_display_fields_do_not_fail() {
        let raw = json!({
            "categories": null,
            "friendly_name": "Editor",
            "compatibility": [{"version": "1.16.x", "image": "org/app:1.16"}]
        });
        let result = normalize(&raw, "ws").unwrap();
        assert!(result["ws"].categories.is_empty());
        assert_eq!(result["ws"].entries().count(), 1);

        let mut legacy = legacy();
        legacy["categories"] = json!("Development");
        legacy["docker_registry"] = json!(7);
        let result = normalize(&legacy, "ws").unwrap();
        assert_eq!(result["ws"].categories, vec!["Development"]);
        assert_eq!(result["ws"].docker_registry, None);
        assert_eq!(result["ws"].compatibility.len(), 3);
    }

    #[test]
    fn test_structured_entries_with_odd_types_stay_entries() {
        let raw = json!({"compatibility": [
            {"version": "1.16.x", "image": "org/app:1.16", "uncompressed_size_mb": "510"},
            {"version": 1.16, "image": "org/app:1.16"}
        ]});
        let result = normalize(&raw, "ws").unwrap();
        assert_eq!(result["ws"].entries().count(), 2);
    }
}
