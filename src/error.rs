use std::error::Error;
use std::fmt;

use crate::registry::descriptor::{Provider, ServiceKind};

/// A single schema or structural violation found while validating a project
/// configuration, addressed by a dotted path into the raw document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the offending value, e.g. `stages.0.services.1.name`
    pub path: String,
    /// Human-readable description of the violation
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug)]
pub enum StackForgeError {
    /// The raw configuration failed the composed schema; carries every
    /// violation found, not just the first
    Validation(Vec<ValidationIssue>),
    /// No descriptor is registered for a (provider, type) pair
    UnknownService { provider: Provider, kind: ServiceKind },
    /// Registry integrity broken: the key is already taken, or the registry
    /// has been sealed against further writes
    DuplicateRegistration { provider: Provider, kind: ServiceKind, sealed: bool },
    /// A declared association's cardinality could not be met for a service
    AssociationResolution { service: String, association: String, matches: usize },
    /// The dependency graph admits no topological order
    CyclicDependency(Vec<String>),
    /// Error while composing or compiling a schema
    SchemaCompilation(String),
    /// Error during configuration handling
    Config(String),
    /// Error during file system operations
    Io(std::io::Error),
}

impl fmt::Display for StackForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackForgeError::Validation(issues) => {
                let details = issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ");
                write!(f, "Validation failed with {} error(s): {}", issues.len(), details)
            }
            StackForgeError::UnknownService { provider, kind } => {
                write!(f, "Service {} for provider {} was not found in the registry", kind, provider)
            }
            StackForgeError::DuplicateRegistration { provider, kind, sealed } => {
                if *sealed {
                    write!(
                        f,
                        "Cannot register service {} for provider {}: the registry is sealed",
                        kind, provider
                    )
                } else {
                    write!(f, "Service {} for provider {} is already registered", kind, provider)
                }
            }
            StackForgeError::AssociationResolution { service, association, matches } => {
                write!(
                    f,
                    "Association '{}' of service '{}' expected exactly one match, found {}",
                    association, service, matches
                )
            }
            StackForgeError::CyclicDependency(cycle) => {
                write!(f, "Circular dependency detected: {}", cycle.join(" -> "))
            }
            StackForgeError::SchemaCompilation(msg) => write!(f, "Schema error: {}", msg),
            StackForgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StackForgeError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl Error for StackForgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StackForgeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StackForgeError {
    fn from(err: std::io::Error) -> Self {
        StackForgeError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, StackForgeError>;
