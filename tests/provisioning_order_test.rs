use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use stackforge::services::default_registry;
use stackforge::{FileStore, MemoryStore, Operation, OperationKind, StorageAdapter};

struct NullSink;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn project_document() -> Value {
    json!({
        "name": "acme-app",
        "provider": "aws",
        "region": "eu-central-1",
        "state": { "provider": "aws", "bucket": "acme-state" },
        "stages": [
            {
                "name": "production",
                "services": [
                    { "name": "web-app", "type": "application", "provider": "aws" },
                    { "name": "app-db", "type": "mysql", "provider": "aws", "database": "acme" },
                    { "name": "main-vpc", "type": "networking", "provider": "aws" }
                ]
            },
            {
                "name": "staging",
                "services": [
                    { "name": "staging-vpc", "type": "networking", "provider": "aws" },
                    { "name": "staging-db", "type": "mysql", "provider": "aws", "database": "acme" }
                ]
            }
        ]
    })
}

fn deploy(stage: &str) -> stackforge::SynthesisSummary {
    init_tracing();
    let registry = Arc::new(default_registry().unwrap());
    let mut operation = Operation::new(registry, OperationKind::Deploy).unwrap();
    operation
        .run(&MemoryStore::new(project_document()), stage, &mut NullSink)
        .unwrap()
}

#[test]
fn test_dependencies_come_before_dependents() {
    let summary = deploy("production");

    assert_eq!(
        summary.order,
        vec!["aws-provider-service", "project-state", "main-vpc", "app-db", "web-app"]
    );
}

#[test]
fn test_implicit_services_join_the_stage() {
    let summary = deploy("production");

    assert!(summary.outputs.contains_key("aws-provider-service"));
    assert_eq!(summary.outputs["project-state"]["bucket"], json!("acme-state"));
}

#[test]
fn test_handler_outputs_record_resolved_links() {
    let summary = deploy("production");

    let db = &summary.outputs["app-db"];
    assert_eq!(db["database"], json!("acme"));
    assert_eq!(db["port"], json!(3306));
    assert_eq!(db["links"], json!(["networking", "providerInstance"]));
}

#[test]
fn test_optional_association_without_match_warns() {
    // No redis service in the stage: the application's cache link stays absent
    let summary = deploy("production");
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.contains("cache") && w.contains("web-app")));
}

#[test]
fn test_stages_resolve_independently() {
    let production = deploy("production");
    let staging = deploy("staging");

    assert!(staging.outputs.contains_key("staging-db"));
    assert!(!staging.outputs.contains_key("app-db"));
    assert!(production.outputs.contains_key("app-db"));
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let first = deploy("production");
    for _ in 0..5 {
        assert_eq!(deploy("production").order, first.order);
    }
}

#[test]
fn test_destroy_walks_dependents_first() {
    let deploy_order = deploy("production").order;

    let registry = Arc::new(default_registry().unwrap());
    let mut operation = Operation::new(registry, OperationKind::Destroy).unwrap();
    let summary = operation
        .run(&MemoryStore::new(project_document()), "production", &mut NullSink)
        .unwrap();

    let mut reversed = deploy_order;
    reversed.reverse();
    assert_eq!(summary.order, reversed);

    // The state backend's destroy handler retains the backend
    assert_eq!(summary.outputs["project-state"], Value::Null);
}

#[test]
fn test_deploy_from_yaml_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().join("project.yaml"));
    store.write(&project_document()).unwrap();

    let registry = Arc::new(default_registry().unwrap());
    let mut operation = Operation::new(registry, OperationKind::Deploy).unwrap();
    let summary = operation.run(&store, "staging", &mut NullSink).unwrap();

    assert_eq!(
        summary.order,
        vec!["aws-provider-service", "project-state", "staging-vpc", "staging-db"]
    );
}
