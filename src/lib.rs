//! StackForge resolves and provisions the services of multi-stage
//! infrastructure projects. A sealed registry of service descriptors drives
//! schema composition, configuration validation, association resolution and
//! deterministic, dependency-ordered handler invocation per stage.

pub mod error;
pub mod operation;
pub mod project;
pub mod registry;
pub mod schema;
pub mod services;
pub mod store;

pub use error::{Result, StackForgeError, ValidationIssue};
pub use operation::{Operation, OperationKind, OperationState, SynthesisSummary};
pub use project::ProjectConfiguration;
pub use registry::descriptor::{Provider, ServiceDescriptor, ServiceKind};
pub use registry::ServiceRegistry;
pub use store::{FileStore, MemoryStore, StorageAdapter};
