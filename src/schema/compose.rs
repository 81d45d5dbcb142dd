use serde_json::{json, Map, Value};

use crate::error::{Result, StackForgeError};
use crate::registry::ServiceRegistry;

/// Pattern every project name must match (URL-friendly segments)
pub const PROJECT_NAME_PATTERN: &str = "^([a-zA-Z0-9-_./]+)$";

/// Composes the discriminated project schema out of the registry contents.
/// The provider and service type enumerations are read live from the
/// registered descriptors, and each descriptor's attribute fragment lands
/// under `$defs`, activated by an `if`/`then` clause keyed on the service's
/// provider and type.
pub struct SchemaComposer<'r> {
    registry: &'r ServiceRegistry,
}

impl<'r> SchemaComposer<'r> {
    pub fn new(registry: &'r ServiceRegistry) -> Self {
        Self { registry }
    }

    pub fn compose(&self) -> Result<Value> {
        if self.registry.is_empty() {
            return Err(StackForgeError::SchemaCompilation(
                "Cannot compose a project schema from an empty registry".to_string(),
            ));
        }

        let providers: Vec<&str> =
            self.registry.providers().iter().map(|p| p.as_str()).collect();
        let kinds: Vec<&str> = self.registry.kinds().iter().map(|k| k.as_str()).collect();

        let mut defs = Map::new();
        let mut discriminators = Vec::new();

        for descriptor in self.registry.descriptors() {
            let key = format!("{}-{}", descriptor.provider, descriptor.kind);
            discriminators.push(json!({
                "if": {
                    "properties": {
                        "provider": { "const": descriptor.provider.as_str() },
                        "type": { "const": descriptor.kind.as_str() }
                    }
                },
                "then": { "$ref": format!("#/$defs/{}", key) }
            }));
            defs.insert(key, descriptor.schema.clone());
        }

        let service_schema = json!({
            "type": "object",
            "required": ["name", "type", "provider"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "type": { "type": "string", "enum": kinds },
                "provider": { "type": "string", "enum": providers },
                "region": { "type": "string" }
            },
            "allOf": discriminators
        });

        let backend_schema = json!({
            "type": "object",
            "properties": {
                "provider": { "type": "string", "enum": providers },
                "region": { "type": "string" }
            }
        });

        Ok(json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["name", "provider", "region", "stages"],
            "properties": {
                "name": {
                    "type": "string",
                    "pattern": PROJECT_NAME_PATTERN,
                    "minLength": 3,
                    "description": "The name of the project in a URL-friendly format"
                },
                "provider": { "type": "string", "enum": providers },
                "region": { "type": "string" },
                "state": backend_schema,
                "secrets": backend_schema,
                "stages": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "services"],
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "services": {
                                "type": "array",
                                "items": service_schema
                            }
                        }
                    }
                }
            },
            "$defs": defs
        }))
    }
}
