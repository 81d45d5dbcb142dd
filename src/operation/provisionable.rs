use std::any::Any;
use std::collections::BTreeMap;

use crate::project::ServiceConfiguration;

/// Opaque output a handler attaches to its provisionable
pub type Output = serde_json::Value;

/// Opaque per-stage target that handlers record infrastructure definitions
/// into. The core passes it through unmodified and never inspects it; handlers
/// downcast to the concrete type the caller supplied.
pub trait Sink: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> Sink for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The target(s) an association resolved to, by service name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLink {
    /// An optional association with no matching sibling
    Absent,
    One(String),
    Many(Vec<String>),
}

impl ResolvedLink {
    /// The linked target names, in match order
    pub fn targets(&self) -> Vec<&str> {
        match self {
            ResolvedLink::Absent => Vec::new(),
            ResolvedLink::One(name) => vec![name.as_str()],
            ResolvedLink::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ResolvedLink::Absent)
    }
}

/// Materialized facts per association, handed to the dependent's handler
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutput {
    Absent,
    One(Output),
    Many(Vec<Output>),
}

pub type LinkOutputs = BTreeMap<String, LinkOutput>;

/// Runtime pairing of a service configuration with its resolved dependency
/// links and, once its handler has run, its output. Created once per service
/// per stage during resolution and discarded at the end of the operation run.
#[derive(Debug, Clone)]
pub struct Provisionable {
    /// The service name, unique within the stage
    pub name: String,
    /// Identifier for generated resources
    pub resource_id: String,
    pub config: ServiceConfiguration,
    /// Association name to resolved target(s), filled during resolution
    pub links: BTreeMap<String, ResolvedLink>,
    /// Attached by the operation once the handler has produced it
    pub output: Option<Output>,
}

impl Provisionable {
    pub fn new(config: ServiceConfiguration) -> Self {
        Self {
            name: config.name.clone(),
            resource_id: config.resource_id(),
            config,
            links: BTreeMap::new(),
            output: None,
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.output.is_some()
    }

    pub fn link(&self, association: &str) -> Option<&ResolvedLink> {
        self.links.get(association)
    }
}
