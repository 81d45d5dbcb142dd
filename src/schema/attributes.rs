use schemars::gen::SchemaGenerator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attributes shared by every database-backed service (MySQL, PostgreSQL,
/// MariaDB). The `database` name is the only hard requirement; engine sizing
/// is optional and falls back to provider defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseAttributes {
    /// Name of the default database to create
    pub database: String,
    /// Allocated storage in gigabytes
    pub storage: Option<u32>,
    /// Engine version, in the provider's version syntax
    pub version: Option<String>,
    /// Port the engine listens on
    pub port: Option<u16>,
}

/// Attributes for in-memory cache services (Redis, Memcached)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheAttributes {
    /// Engine version
    pub version: Option<String>,
    /// Port the cache listens on
    pub port: Option<u16>,
    /// Number of cache nodes
    pub nodes: Option<u32>,
}

/// Attributes for the per-stage network fabric
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkingAttributes {
    /// CIDR block for the root network
    pub cidr: Option<String>,
}

/// Attributes for object storage buckets
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObjectStoreAttributes {
    /// Bucket name; globally unique within the provider
    pub bucket: String,
    /// Whether objects are versioned
    pub versioning: Option<bool>,
}

/// Attributes for the project state backend
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StateAttributes {
    /// Bucket or path the state document lives in
    pub bucket: Option<String>,
}

/// Attributes for the project secrets backend
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecretsAttributes {
    /// Path prefix for secrets owned by the project
    pub path: Option<String>,
}

/// Attributes for application workloads
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationAttributes {
    /// Container image or artifact reference
    pub image: Option<String>,
    /// Port the application serves on
    pub port: Option<u16>,
}

/// Attributes for the implicit provider instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderAttributes {
    /// Named credentials profile to authenticate with
    pub profile: Option<String>,
}

/// Derives a plain schema fragment from a schemars type, suitable for
/// embedding under `$defs`. The root-schema envelope (`$schema`, `title`) is
/// stripped so the fragment composes cleanly.
pub fn schema_fragment<T: JsonSchema>() -> Value {
    let root = SchemaGenerator::default().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| Value::Object(Default::default()));

    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}
