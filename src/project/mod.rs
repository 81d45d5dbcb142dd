pub mod stage;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use stage::stage_services;

use crate::error::{Result, StackForgeError};
use crate::registry::descriptor::{Provider, ServiceKind};

/// The declarative description of a multi-stage infrastructure project.
/// Immutable once loaded; validation against the composed schema happens on
/// the raw document before this type is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    /// Name of the project in a URL-friendly format
    pub name: String,
    /// Default provider for services that do not state their own
    pub provider: Provider,
    /// Default region for the provider selected above
    pub region: String,
    /// Where the generated state is stored
    #[serde(default)]
    pub state: Option<BackendConfiguration>,
    /// Where service secrets are stored
    #[serde(default)]
    pub secrets: Option<BackendConfiguration>,
    /// Ordered deployment stages; names are unique and at least one exists
    pub stages: Vec<Stage>,
}

impl ProjectConfiguration {
    /// Deserializes a validated raw document into the project model
    pub fn from_value(raw: Value) -> Result<Self> {
        serde_json::from_value(raw)
            .map_err(|e| StackForgeError::Config(format!("Invalid project configuration: {}", e)))
    }

    /// Finds a stage by its environment name
    pub fn stage(&self, name: &str) -> Result<&Stage> {
        self.stages
            .iter()
            .find(|stage| stage.name == name)
            .ok_or_else(|| StackForgeError::Config(format!("Stage '{}' not found", name)))
    }
}

/// Configuration for a project-level backend (state storage or secrets vault)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfiguration {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub region: Option<String>,
    /// Backend-specific attributes (bucket names, paths, ...)
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

/// A named, independently resolved subset of the project's services,
/// corresponding to one deployment environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub services: Vec<ServiceConfiguration>,
}

/// One service entry within a stage. The typed fields are the ones every
/// service shares; everything else stays in `attributes` and is validated
/// against the descriptor's schema fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Unique within the stage
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub provider: Provider,
    /// Falls back to the project default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Type-specific attributes
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl ServiceConfiguration {
    /// Identifier usable for generated resources, mirroring
    /// `{name}-{provider}-{region or "default"}`
    pub fn resource_id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.name,
            self.provider,
            self.region.as_deref().unwrap_or("default")
        )
    }

    /// Looks up a type-specific attribute by key
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}
