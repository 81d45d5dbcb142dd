use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use stackforge::registry::descriptor::{
    AssociationDeclaration, Cardinality, Provider, ServiceKind, TargetSelector,
};
use stackforge::services::default_registry;
use stackforge::{
    MemoryStore, Operation, OperationKind, OperationState, ServiceDescriptor, ServiceRegistry,
    StackForgeError,
};

struct NullSink;

fn operation(kind: OperationKind) -> Operation {
    Operation::new(Arc::new(default_registry().unwrap()), kind).unwrap()
}

#[test]
fn test_invalid_document_reports_every_violation() {
    let mut operation = operation(OperationKind::Deploy);

    // Short name, unknown provider on one service, missing database attribute
    // on another; all three must surface in one pass
    let raw = json!({
        "name": "ab",
        "provider": "aws",
        "region": "eu-central-1",
        "stages": [{
            "name": "production",
            "services": [
                { "name": "net", "type": "networking", "provider": "azure" },
                { "name": "app-db", "type": "mysql", "provider": "aws" }
            ]
        }]
    });

    match operation.validate(&raw) {
        Err(StackForgeError::Validation(issues)) => {
            assert!(issues.len() >= 3, "expected at least 3 violations, got {:?}", issues);
            assert!(issues.iter().any(|i| i.path == "name"));
            assert!(issues.iter().any(|i| i.path.starts_with("stages.0.services.0.provider")));
            assert!(issues.iter().any(|i| i.path.starts_with("stages.0.services.1")));
        }
        other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(operation.state(), OperationState::Failed);
}

#[test]
fn test_duplicate_service_names_are_rejected() {
    let mut operation = operation(OperationKind::Deploy);

    let raw = json!({
        "name": "acme-app",
        "provider": "aws",
        "region": "eu-central-1",
        "stages": [{
            "name": "production",
            "services": [
                { "name": "db", "type": "mysql", "provider": "aws", "database": "a" },
                { "name": "db", "type": "mysql", "provider": "aws", "database": "b" }
            ]
        }]
    });

    match operation.validate(&raw) {
        Err(StackForgeError::Validation(issues)) => {
            assert!(issues.iter().any(|i| i.path == "stages.0.services.1.name"));
        }
        other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_provider_mismatch_fails_association_resolution() {
    let mut operation = operation(OperationKind::Deploy);

    // The database requires networking from its own provider; the only
    // network in the stage runs on a different one
    let raw = json!({
        "name": "acme-app",
        "provider": "aws",
        "region": "eu-central-1",
        "stages": [{
            "name": "production",
            "services": [
                { "name": "app-db", "type": "mysql", "provider": "aws", "database": "acme" },
                { "name": "main-vpc", "type": "networking", "provider": "local" }
            ]
        }]
    });

    operation.validate(&raw).unwrap();
    match operation.resolve("production") {
        Err(StackForgeError::AssociationResolution { service, association, matches }) => {
            assert_eq!(service, "app-db");
            assert_eq!(association, "networking");
            assert_eq!(matches, 0);
        }
        other => panic!("expected AssociationResolution, got {:?}", other.map(|_| ())),
    }
    assert_eq!(operation.state(), OperationState::Failed);
}

#[test]
fn test_unknown_stage_is_rejected() {
    let mut operation = operation(OperationKind::Deploy);

    let raw = json!({
        "name": "acme-app",
        "provider": "aws",
        "region": "eu-central-1",
        "stages": [{ "name": "production", "services": [] }]
    });

    operation.validate(&raw).unwrap();
    assert!(matches!(operation.resolve("review"), Err(StackForgeError::Config(_))));
}

#[test]
fn test_mutual_dependencies_are_reported_as_a_cycle() {
    let mut registry = ServiceRegistry::new();
    registry
        .register(
            ServiceDescriptor::new(
                Provider::Aws,
                ServiceKind::Application,
                json!({ "type": "object" }),
                Arc::new(|_, _, _| Ok(json!({}))),
            )
            .with_association(AssociationDeclaration::passthrough(
                "cache",
                TargetSelector::Kind { kind: ServiceKind::Redis, same_provider: true },
                Cardinality::RequiredOne,
            )),
        )
        .unwrap();
    registry
        .register(
            ServiceDescriptor::new(
                Provider::Aws,
                ServiceKind::Redis,
                json!({ "type": "object" }),
                Arc::new(|_, _, _| Ok(json!({}))),
            )
            .with_association(AssociationDeclaration::passthrough(
                "owner",
                TargetSelector::Kind { kind: ServiceKind::Application, same_provider: true },
                Cardinality::RequiredOne,
            )),
        )
        .unwrap();
    registry.seal();

    let raw = json!({
        "name": "acme-app",
        "provider": "aws",
        "region": "eu-central-1",
        "stages": [{
            "name": "production",
            "services": [
                { "name": "web", "type": "application", "provider": "aws" },
                { "name": "cache", "type": "redis", "provider": "aws" }
            ]
        }]
    });

    let mut operation = Operation::new(Arc::new(registry), OperationKind::Deploy).unwrap();
    operation.validate(&raw).unwrap();

    match operation.resolve("production") {
        Err(StackForgeError::CyclicDependency(cycle)) => {
            assert_eq!(cycle.len(), 2);
            assert!(cycle.contains(&"web".to_string()));
            assert!(cycle.contains(&"cache".to_string()));
        }
        other => panic!("expected CyclicDependency, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_failed_operation_refuses_further_transitions() {
    let mut operation = operation(OperationKind::Deploy);
    let _ = operation.validate(&json!({ "name": "x" }));
    assert_eq!(operation.state(), OperationState::Failed);

    assert!(operation.resolve("production").is_err());
    assert!(operation.synthesize(&mut NullSink).is_err());
}

#[test]
fn test_run_succeeds_with_stateless_sink() {
    // NullSink has no state; handlers downcasting to something else simply
    // skip recording. The run must still succeed.
    let mut operation = operation(OperationKind::Deploy);
    let raw: Value = json!({
        "name": "acme-app",
        "provider": "aws",
        "region": "eu-central-1",
        "stages": [{
            "name": "production",
            "services": [
                { "name": "main-vpc", "type": "networking", "provider": "aws" }
            ]
        }]
    });

    let summary = operation
        .run(&MemoryStore::new(raw), "production", &mut NullSink)
        .unwrap();
    assert!(summary.finished_at >= summary.started_at);
}
