use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::operation::provisionable::{LinkOutputs, Output, Provisionable, Sink};
use crate::project::ServiceConfiguration;

/// Cloud providers a service can be deployed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Local => "local",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of service kinds the pipeline knows how to provision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    Application,
    Mariadb,
    Memcached,
    Mysql,
    Networking,
    ObjectStore,
    Postgresql,
    Provider,
    Redis,
    Secrets,
    State,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Application => "application",
            ServiceKind::Mariadb => "mariadb",
            ServiceKind::Memcached => "memcached",
            ServiceKind::Mysql => "mysql",
            ServiceKind::Networking => "networking",
            ServiceKind::ObjectStore => "object-store",
            ServiceKind::Postgresql => "postgresql",
            ServiceKind::Provider => "provider",
            ServiceKind::Redis => "redis",
            ServiceKind::Secrets => "secrets",
            ServiceKind::State => "state",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler invoked with a resolved unit, the opaque sink and the materialized
/// link outputs; returns an opaque output attachable to the provisionable.
pub type ProvisionHandler =
    Arc<dyn Fn(&Provisionable, &mut dyn Sink, &LinkOutputs) -> Result<Output> + Send + Sync>;

/// Callback invoked once an association target has been provisioned; derives a
/// fact (such as a provider handle) the dependent's handler will receive.
pub type Materializer =
    Arc<dyn Fn(&Provisionable, &ServiceConfiguration) -> Result<Output> + Send + Sync>;

/// Predicate over (dependent configuration, candidate configuration)
pub type SelectorPredicate =
    Arc<dyn Fn(&ServiceConfiguration, &ServiceConfiguration) -> bool + Send + Sync>;

/// Decides which sibling services an association points at
#[derive(Clone)]
pub enum TargetSelector {
    /// Match candidates by service kind, optionally restricted to the
    /// dependent's own provider
    Kind { kind: ServiceKind, same_provider: bool },
    /// Arbitrary predicate over the dependent and candidate configurations
    Where(SelectorPredicate),
}

impl TargetSelector {
    pub fn matches(
        &self,
        dependent: &ServiceConfiguration,
        candidate: &ServiceConfiguration,
    ) -> bool {
        match self {
            TargetSelector::Kind { kind, same_provider } => {
                candidate.kind == *kind
                    && (!same_provider || candidate.provider == dependent.provider)
            }
            TargetSelector::Where(predicate) => predicate(dependent, candidate),
        }
    }
}

impl fmt::Debug for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSelector::Kind { kind, same_provider } => f
                .debug_struct("Kind")
                .field("kind", kind)
                .field("same_provider", same_provider)
                .finish(),
            TargetSelector::Where(_) => f.write_str("Where(<predicate>)"),
        }
    }
}

/// How many targets an association must resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one match; zero or more than one is a resolution error
    RequiredOne,
    /// Zero matches records an absent link; more than one is an error
    Optional,
    /// Every match is recorded
    Many,
}

/// A declared dependency from one service type to others, owned by a
/// descriptor. Discovery decides *which* provisionables are linked; the
/// materializer runs later, during the topological walk, once the target's
/// handler has produced output.
#[derive(Clone)]
pub struct AssociationDeclaration {
    pub name: String,
    pub selector: TargetSelector,
    pub cardinality: Cardinality,
    pub materialize: Materializer,
}

impl AssociationDeclaration {
    pub fn new(
        name: impl Into<String>,
        selector: TargetSelector,
        cardinality: Cardinality,
        materialize: Materializer,
    ) -> Self {
        Self { name: name.into(), selector, cardinality, materialize }
    }

    /// Declares an association whose materializer hands the target's own
    /// output through to the dependent unchanged.
    pub fn passthrough(
        name: impl Into<String>,
        selector: TargetSelector,
        cardinality: Cardinality,
    ) -> Self {
        Self::new(
            name,
            selector,
            cardinality,
            Arc::new(|target, _dependent| Ok(target.output.clone().unwrap_or(Output::Null))),
        )
    }
}

impl fmt::Debug for AssociationDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationDeclaration")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

/// Everything the pipeline needs to know about one (provider, kind) pair:
/// the schema fragment for its attributes, the associations it declares and
/// the handlers that synthesize or tear it down.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub provider: Provider,
    pub kind: ServiceKind,
    /// Schema fragment merged into the composed project schema under `$defs`
    pub schema: serde_json::Value,
    pub associations: Vec<AssociationDeclaration>,
    pub handler: ProvisionHandler,
    /// Optional dedicated teardown handler; destroy operations fall back to
    /// `handler` when absent
    pub destroy_handler: Option<ProvisionHandler>,
}

impl ServiceDescriptor {
    pub fn new(
        provider: Provider,
        kind: ServiceKind,
        schema: serde_json::Value,
        handler: ProvisionHandler,
    ) -> Self {
        Self { provider, kind, schema, associations: Vec::new(), handler, destroy_handler: None }
    }

    pub fn with_association(mut self, association: AssociationDeclaration) -> Self {
        self.associations.push(association);
        self
    }

    pub fn with_destroy_handler(mut self, handler: ProvisionHandler) -> Self {
        self.destroy_handler = Some(handler);
        self
    }

    pub fn key(&self) -> (Provider, ServiceKind) {
        (self.provider, self.kind)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDeclaration> {
        self.associations.iter().find(|a| a.name == name)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("provider", &self.provider)
            .field("kind", &self.kind)
            .field("associations", &self.associations)
            .finish()
    }
}
