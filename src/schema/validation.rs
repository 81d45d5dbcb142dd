use std::collections::BTreeSet;
use std::sync::Arc;

use jsonschema::{validator_for, Validator};
use serde_json::Value;

use crate::error::{Result, StackForgeError, ValidationIssue};
use crate::registry::ServiceRegistry;
use crate::schema::compose::SchemaComposer;

/// A compiled JSON schema validator
#[derive(Clone)]
pub struct CompiledSchema {
    schema: Arc<Validator>,
}

impl CompiledSchema {
    /// Compiles a schema document into a reusable validator
    pub fn compile(schema: &Value) -> Result<Self> {
        let validator = validator_for(schema).map_err(|e| {
            StackForgeError::SchemaCompilation(format!("Failed to compile schema: {}", e))
        })?;
        Ok(Self { schema: Arc::new(validator) })
    }

    /// Collects every violation the document has against the schema. An empty
    /// result means the document is valid.
    pub fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        self.schema
            .iter_errors(value)
            .map(|error| ValidationIssue {
                path: normalize_pointer(&error.instance_path.to_string()),
                message: error.to_string(),
            })
            .collect()
    }
}

/// Validates raw project documents against the schema composed from the
/// registry, together with structural rules a JSON schema cannot express
/// (uniqueness of stage and service names).
pub struct ValidationService {
    project_schema: CompiledSchema,
}

impl ValidationService {
    /// Composes and compiles the project schema for the registry's current
    /// contents. Meant to be built once per operation, after sealing.
    pub fn new(registry: &ServiceRegistry) -> Result<Self> {
        let schema = SchemaComposer::new(registry).compose()?;
        Ok(Self { project_schema: CompiledSchema::compile(&schema)? })
    }

    /// Validates a raw project document exhaustively. All violations are
    /// collected before returning; a failing document never yields only the
    /// first problem found.
    pub fn validate(&self, raw: &Value) -> Result<()> {
        let mut issues = self.project_schema.validate(raw);
        issues.extend(structural_issues(raw));

        // Schema and structural checks can overlap on the same path
        let mut seen = BTreeSet::new();
        issues.retain(|issue| seen.insert((issue.path.clone(), issue.message.clone())));

        if issues.is_empty() {
            Ok(())
        } else {
            tracing::warn!(violations = issues.len(), "project configuration is invalid");
            Err(StackForgeError::Validation(issues))
        }
    }
}

/// Uniqueness rules over the raw document: stage names must be unique within
/// the project, service names within each stage.
fn structural_issues(raw: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let stages = match raw.get("stages").and_then(Value::as_array) {
        Some(stages) => stages,
        None => return issues,
    };

    let mut stage_names = BTreeSet::new();
    for (stage_position, stage) in stages.iter().enumerate() {
        if let Some(name) = stage.get("name").and_then(Value::as_str) {
            if !stage_names.insert(name) {
                issues.push(ValidationIssue {
                    path: format!("stages.{}.name", stage_position),
                    message: format!("Duplicate stage name '{}'", name),
                });
            }
        }

        let services = match stage.get("services").and_then(Value::as_array) {
            Some(services) => services,
            None => continue,
        };

        let mut service_names = BTreeSet::new();
        for (service_position, service) in services.iter().enumerate() {
            if let Some(name) = service.get("name").and_then(Value::as_str) {
                if !service_names.insert(name) {
                    issues.push(ValidationIssue {
                        path: format!(
                            "stages.{}.services.{}.name",
                            stage_position, service_position
                        ),
                        message: format!("Duplicate service name '{}' in stage", name),
                    });
                }
            }
        }
    }

    issues
}

/// Turns a JSON pointer (`/stages/0/name`) into the dotted path the rest of
/// the system reports (`stages.0.name`). The document root maps to an empty
/// path.
pub fn normalize_pointer(pointer: &str) -> String {
    pointer.trim_start_matches('/').replace('/', ".")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::registry::descriptor::{Provider, ServiceDescriptor, ServiceKind};

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry
            .register(ServiceDescriptor::new(
                Provider::Aws,
                ServiceKind::Mysql,
                json!({ "type": "object", "required": ["database"] }),
                Arc::new(|_, _, _| Ok(json!({}))),
            ))
            .unwrap();
        registry
            .register(ServiceDescriptor::new(
                Provider::Aws,
                ServiceKind::Networking,
                json!({ "type": "object" }),
                Arc::new(|_, _, _| Ok(json!({}))),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_normalize_pointer() {
        assert_eq!(normalize_pointer("/stages/0/services/1/name"), "stages.0.services.1.name");
        assert_eq!(normalize_pointer(""), "");
    }

    #[test]
    fn test_valid_document_passes() {
        let service = ValidationService::new(&registry()).unwrap();
        let raw = json!({
            "name": "acme-app",
            "provider": "aws",
            "region": "eu-central-1",
            "stages": [{
                "name": "production",
                "services": [
                    { "name": "app-db", "type": "mysql", "provider": "aws", "database": "acme" }
                ]
            }]
        });

        assert!(service.validate(&raw).is_ok());
    }

    #[test]
    fn test_all_violations_are_collected() {
        let service = ValidationService::new(&registry()).unwrap();
        // Three independent problems: bad provider, missing database attribute
        // on the mysql entry, short project name
        let raw = json!({
            "name": "ab",
            "provider": "aws",
            "region": "eu-central-1",
            "stages": [{
                "name": "production",
                "services": [
                    { "name": "app-db", "type": "mysql", "provider": "aws" },
                    { "name": "net", "type": "networking", "provider": "azure" }
                ]
            }]
        });

        match service.validate(&raw) {
            Err(StackForgeError::Validation(issues)) => {
                assert!(issues.len() >= 3, "expected at least 3 issues, got {:?}", issues);
                assert!(issues.iter().any(|i| i.path == "name"));
                assert!(issues.iter().any(|i| i.path.starts_with("stages.0.services.0")));
                assert!(issues
                    .iter()
                    .any(|i| i.path.starts_with("stages.0.services.1.provider")));
            }
            other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_duplicate_names_are_structural_violations() {
        let service = ValidationService::new(&registry()).unwrap();
        let raw = json!({
            "name": "acme-app",
            "provider": "aws",
            "region": "eu-central-1",
            "stages": [
                {
                    "name": "production",
                    "services": [
                        { "name": "db", "type": "mysql", "provider": "aws", "database": "a" },
                        { "name": "db", "type": "mysql", "provider": "aws", "database": "b" }
                    ]
                },
                { "name": "production", "services": [] }
            ]
        });

        match service.validate(&raw) {
            Err(StackForgeError::Validation(issues)) => {
                assert!(issues.iter().any(|i| i.path == "stages.1.name"));
                assert!(issues.iter().any(|i| i.path == "stages.0.services.1.name"));
            }
            other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
        }
    }
}
