//! Single-manifest pipeline tests against on-disk fixtures

mod common;

use std::sync::Arc;

use common::{fixture, fixture_text, init_test_logging, MockInspector};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wsharvest_core::filter::{ContentFilter, DisallowedTerms};
use wsharvest_core::manifest::normalize;
use wsharvest_core::projector::project_original;
use wsharvest_core::pullability::PullabilityChecker;
use wsharvest_core::{Rejection, WorkspacePipeline};

fn pipeline(inspector: Arc<MockInspector>) -> WorkspacePipeline {
    WorkspacePipeline::new(
        ContentFilter::new(Arc::new(DisallowedTerms::default())),
        PullabilityChecker::new(inspector),
    )
}

fn versions(projected: &Value) -> Vec<String> {
    projected["compatibility"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| match item {
            Value::String(version) => version.clone(),
            other => other["version"].as_str().unwrap().to_string(),
        })
        .collect()
}

#[tokio::test]
async fn test_legacy_manifest_keeps_its_shape() {
    init_test_logging();
    let inspector = MockInspector::accepting(&["myregistry/test-image:latest"]);
    let pipeline = pipeline(inspector.clone());
    let raw = fixture("workspace_old_format.json");

    let projected = pipeline.process_workspace("test-workspace", &raw).await.unwrap();

    assert_eq!(projected, raw);
    assert_eq!(inspector.calls().len(), 3);
    assert_eq!(pipeline.stats().snapshot().truncated_compatibility_workspaces, 0);
}

#[tokio::test]
async fn test_legacy_projection_to_verified_versions() {
    init_test_logging();
    let raw = fixture("workspace_old_format.json");
    let normalized = normalize(&raw, "test-workspace").unwrap();
    let canonical = &normalized["test-workspace"];

    assert_eq!(canonical.compatibility.len(), 3);
    assert_eq!(
        canonical.docker_registry.as_deref(),
        Some("registry.example.com")
    );

    let verified = canonical.with_compatibility(
        canonical
            .entries()
            .filter(|e| e.version.as_deref() != Some("1.15.x"))
            .cloned()
            .collect(),
    );

    let projected = project_original(&raw, Some(&verified)).unwrap();
    assert_eq!(projected["compatibility"], json!(["1.16.x", "1.17.x"]));
    assert_eq!(projected["name"], raw["name"]);
    assert_eq!(projected["uncompressed_size_mb"], 500);
    assert_eq!(raw["compatibility"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_current_manifest_drops_unpullable_entries() {
    init_test_logging();
    let inspector = MockInspector::accepting(&[
        "myregistry/test-image:1.16.0",
        "registry.example.com/myregistry/test-image:1.17.0",
    ]);
    let pipeline = pipeline(inspector.clone());
    let raw = fixture("workspace_new_format.json");

    let projected = pipeline.process_workspace("test-workspace", &raw).await.unwrap();

    assert_eq!(versions(&projected), vec!["1.16.x", "1.17.x"]);
    assert_eq!(
        projected["compatibility"][1],
        json!({"version": "1.17.x", "image": "myregistry/test-image:1.17.0", "uncompressed_size_mb": 520})
    );
    assert_eq!(projected["image_src"], "test-workspace.png");

    let calls = inspector.calls();
    assert!(calls.contains(&"registry.example.com/myregistry/test-image:1.15.0".to_string()));
    assert!(!calls.contains(&"registry.example.com/myregistry/test-image:1.16.0".to_string()));
}

#[tokio::test]
async fn test_compatibility_list_is_capped() {
    init_test_logging();
    let inspector = MockInspector::accepting_all();
    let pipeline = pipeline(inspector.clone());
    let raw = fixture("workspace_many_compatibility.json");

    let projected = pipeline.process_workspace("many", &raw).await.unwrap();

    let kept = versions(&projected);
    assert_eq!(kept.len(), 10);
    assert_eq!(kept.first().map(String::as_str), Some("1.10.x"));
    assert_eq!(kept.last().map(String::as_str), Some("1.19.x"));
    assert_eq!(inspector.calls().len(), 10);
    assert_eq!(pipeline.stats().snapshot().truncated_compatibility_workspaces, 1);
}

#[tokio::test]
async fn test_disallowed_content_is_rejected_before_inspection() {
    init_test_logging();
    let inspector = MockInspector::accepting_all();
    let pipeline = pipeline(inspector.clone());
    let raw = fixture("workspace_profanity.json");

    let result = pipeline.process_workspace("test-workspace", &raw).await;

    assert_eq!(
        result.unwrap_err(),
        Rejection::ContentRejected { field: "description" }
    );
    assert!(inspector.calls().is_empty());
    assert_eq!(pipeline.stats().snapshot().profanity_filtered_workspaces, 1);
}

#[tokio::test]
async fn test_reserved_image_is_never_inspected() {
    init_test_logging();
    let inspector = MockInspector::accepting_all();
    let pipeline = pipeline(inspector.clone());
    let raw = fixture("workspace_reserved_image.json");

    let result = pipeline.process_workspace("chrome", &raw).await;

    assert_eq!(result.unwrap_err(), Rejection::UnreachableImage);
    assert!(inspector.calls().is_empty());
    assert_eq!(pipeline.stats().snapshot().unreachable_image_workspaces, 1);
}

#[tokio::test]
async fn test_unpullable_manifest_counts_as_unreachable() {
    init_test_logging();
    let pipeline = pipeline(MockInspector::accepting(&[]));

    let result = pipeline
        .process_manifest_text("test-workspace", &fixture_text("workspace_new_format.json"))
        .await;

    assert_eq!(result.unwrap_err(), Rejection::UnreachableImage);
    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.unreachable_image_workspaces, 1);
    assert_eq!(stats.invalid_format_workspaces, 0);
}

#[tokio::test]
async fn test_malformed_manifests_count_as_invalid_format() {
    init_test_logging();
    let inspector = MockInspector::accepting_all();
    let pipeline = pipeline(inspector.clone());

    let broken = pipeline.process_manifest_text("broken", "{not json").await;
    assert!(matches!(broken, Err(Rejection::MalformedInput(_))));

    let scalar = pipeline
        .process_workspace("scalar", &json!({"compatibility": "1.16.x"}))
        .await;
    assert!(matches!(scalar, Err(Rejection::MalformedInput(_))));

    let mixed = pipeline
        .process_workspace(
            "mixed",
            &json!({"compatibility": [{"version": "1.16.x", "image": "a:1"}, 7]}),
        )
        .await;
    assert!(matches!(mixed, Err(Rejection::MalformedInput(_))));

    assert_eq!(pipeline.stats().snapshot().invalid_format_workspaces, 3);
    assert!(inspector.calls().is_empty());
}

#[tokio::test]
async fn test_structured_entries_with_unusual_field_types_are_verified() {
    init_test_logging();
    let inspector = MockInspector::accepting_all();
    let pipeline = pipeline(inspector.clone());
    let raw = json!({
        "friendly_name": "App",
        "categories": null,
        "compatibility": [
            {"version": "1.16.x", "image": "org/app:1.16", "uncompressed_size_mb": "510"},
            {"version": "1.17.x", "image": "org/app:1.17", "uncompressed_size_mb": 520},
            {"version": 1.18, "image": "org/app:1.18"}
        ]
    });

    let projected = pipeline.process_workspace("ws", &raw).await.unwrap();

    assert_eq!(projected, raw);
    assert_eq!(inspector.calls().len(), 3);
    assert_eq!(pipeline.stats().snapshot().invalid_format_workspaces, 0);
}

#[tokio::test]
async fn test_entries_without_string_image_are_dropped_not_fatal() {
    init_test_logging();
    let inspector = MockInspector::accepting_all();
    let pipeline = pipeline(inspector.clone());
    let raw = json!({
        "categories": "Development",
        "compatibility": [
            {"version": "1.16.x", "image": 16},
            {"version": "1.17.x", "image": "org/app:1.17"}
        ]
    });

    let projected = pipeline.process_workspace("ws", &raw).await.unwrap();

    assert_eq!(
        projected["compatibility"],
        json!([{"version": "1.17.x", "image": "org/app:1.17"}])
    );
    assert_eq!(inspector.calls(), vec!["org/app:1.17"]);
}
