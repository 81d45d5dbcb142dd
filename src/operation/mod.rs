pub mod provisionable;
pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub use provisionable::{LinkOutput, LinkOutputs, Output, Provisionable, ResolvedLink, Sink};
pub use resolver::{ResolvedStage, StageResolver};

use crate::error::{Result, StackForgeError};
use crate::project::{stage_services, ProjectConfiguration, ServiceConfiguration};
use crate::registry::descriptor::{AssociationDeclaration, ServiceDescriptor};
use crate::registry::ServiceRegistry;
use crate::schema::validation::ValidationService;
use crate::store::StorageAdapter;

/// Lifecycle of an operation run for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Validated,
    Resolved,
    Synthesized,
    Completed,
    Failed,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Created => "Created",
            OperationState::Validated => "Validated",
            OperationState::Resolved => "Resolved",
            OperationState::Synthesized => "Synthesized",
            OperationState::Completed => "Completed",
            OperationState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// What an operation does with the resolved stage. Both kinds share the
/// resolution result; they differ in traversal direction and handler scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Dependencies-first walk, provision handlers, link materialization
    Deploy,
    /// Dependents-first walk, destroy handlers where declared, no
    /// materialization
    Destroy,
}

/// Diagnostics collected over one synthesized stage
#[derive(Debug, Clone)]
pub struct SynthesisSummary {
    pub stage: String,
    pub kind: OperationKind,
    /// The order handlers were invoked in
    pub order: Vec<String>,
    /// Handler output per service name
    pub outputs: BTreeMap<String, Output>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SynthesisSummary {
    pub fn service_count(&self) -> usize {
        self.order.len()
    }
}

/// Drives one stage of a project through validation, resolution and handler
/// invocation. Any failure in any transition moves the operation to `Failed`;
/// no partial synthesis is ever returned, since infrastructure definitions
/// missing required dependencies are unsafe to emit.
pub struct Operation {
    registry: Arc<ServiceRegistry>,
    kind: OperationKind,
    state: OperationState,
    validation: ValidationService,
    project: Option<ProjectConfiguration>,
    resolved: Option<ResolvedStage>,
}

impl Operation {
    /// Creates an operation over a sealed registry. Refusing unsealed
    /// registries guarantees no registration can race the first resolution.
    pub fn new(registry: Arc<ServiceRegistry>, kind: OperationKind) -> Result<Self> {
        if !registry.is_sealed() {
            return Err(StackForgeError::Config(
                "The service registry must be sealed before operations begin".to_string(),
            ));
        }

        let validation = ValidationService::new(&registry)?;

        Ok(Self {
            registry,
            kind,
            state: OperationState::Created,
            validation,
            project: None,
            resolved: None,
        })
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn project(&self) -> Option<&ProjectConfiguration> {
        self.project.as_ref()
    }

    pub fn resolved(&self) -> Option<&ResolvedStage> {
        self.resolved.as_ref()
    }

    /// Created -> Validated: runs the composed schema over the raw document
    /// and loads the project model. The error carries every violation found;
    /// presentation is the caller's responsibility.
    pub fn validate(&mut self, raw: &Value) -> Result<&ProjectConfiguration> {
        self.expect_state(OperationState::Created)?;

        let loaded = self
            .validation
            .validate(raw)
            .and_then(|()| ProjectConfiguration::from_value(raw.clone()));

        match loaded {
            Ok(project) => {
                self.state = OperationState::Validated;
                Ok(&*self.project.insert(project))
            }
            Err(err) => {
                self.state = OperationState::Failed;
                Err(err)
            }
        }
    }

    /// Validated -> Resolved: derives the per-stage service list, resolves
    /// associations and computes the provisioning order.
    pub fn resolve(&mut self, stage_name: &str) -> Result<&ResolvedStage> {
        self.expect_state(OperationState::Validated)?;

        let result = (|| {
            let project = self
                .project
                .as_ref()
                .ok_or_else(|| StackForgeError::Config("No project loaded".to_string()))?;
            let stage = project.stage(stage_name)?;
            let services = stage_services(project, stage, &self.registry);
            StageResolver::new(&self.registry).resolve(stage_name, services)
        })();

        match result {
            Ok(resolved) => {
                self.state = OperationState::Resolved;
                Ok(&*self.resolved.insert(resolved))
            }
            Err(err) => {
                self.state = OperationState::Failed;
                Err(err)
            }
        }
    }

    /// Resolved -> Synthesized -> Completed: invokes each provisionable's
    /// handler in sorted order, materializing resolved links strictly after
    /// the target's own handler has produced output.
    pub fn synthesize(&mut self, sink: &mut dyn Sink) -> Result<SynthesisSummary> {
        self.expect_state(OperationState::Resolved)?;

        match self.run_handlers(sink) {
            Ok(summary) => {
                self.state = OperationState::Completed;
                Ok(summary)
            }
            Err(err) => {
                self.state = OperationState::Failed;
                Err(err)
            }
        }
    }

    /// Convenience: read from the storage adapter and drive all transitions
    pub fn run(
        &mut self,
        adapter: &dyn StorageAdapter,
        stage_name: &str,
        sink: &mut dyn Sink,
    ) -> Result<SynthesisSummary> {
        let raw = adapter.read()?;
        self.validate(&raw)?;
        self.resolve(stage_name)?;
        self.synthesize(sink)
    }

    fn expect_state(&self, expected: OperationState) -> Result<()> {
        if self.state != expected {
            return Err(StackForgeError::Config(format!(
                "Operation is in state {}, expected {}",
                self.state, expected
            )));
        }
        Ok(())
    }

    fn run_handlers(&mut self, sink: &mut dyn Sink) -> Result<SynthesisSummary> {
        let registry = Arc::clone(&self.registry);
        let kind = self.kind;
        let resolved = self
            .resolved
            .as_mut()
            .ok_or_else(|| StackForgeError::Config("No resolved stage".to_string()))?;

        let order = match kind {
            OperationKind::Deploy => resolved.provisioning_order().to_vec(),
            OperationKind::Destroy => resolved.teardown_order(),
        };

        let started_at = Utc::now();
        let mut outputs = BTreeMap::new();

        for name in &order {
            let position = resolved.index_of(name)?;
            let (provider, service_kind) = {
                let provisionable = &resolved.provisionables()[position];
                (provisionable.config.provider, provisionable.config.kind)
            };
            let descriptor = registry.lookup(provider, service_kind)?;

            let link_outputs = match kind {
                OperationKind::Deploy => materialize_links(resolved, position, descriptor)?,
                OperationKind::Destroy => resolved.provisionables()[position]
                    .links
                    .keys()
                    .map(|name| (name.clone(), LinkOutput::Absent))
                    .collect(),
            };

            let handler = match kind {
                OperationKind::Deploy => Arc::clone(&descriptor.handler),
                OperationKind::Destroy => descriptor
                    .destroy_handler
                    .as_ref()
                    .map(Arc::clone)
                    .unwrap_or_else(|| Arc::clone(&descriptor.handler)),
            };

            let output = handler(&resolved.provisionables()[position], sink, &link_outputs)?;
            outputs.insert(name.clone(), output.clone());
            resolved.attach_output(position, output);
            tracing::debug!(service = %name, "handler completed");
        }

        self.state = OperationState::Synthesized;
        tracing::info!(stage = %resolved.stage, services = order.len(), "stage synthesized");

        Ok(SynthesisSummary {
            stage: resolved.stage.clone(),
            kind,
            order,
            outputs,
            warnings: resolved.warnings().to_vec(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Runs every materializer of a provisionable's resolved links. The
/// topological order guarantees each target already carries output; a missing
/// output here is an internal invariant violation, not a configuration error.
fn materialize_links(
    resolved: &ResolvedStage,
    position: usize,
    descriptor: &ServiceDescriptor,
) -> Result<LinkOutputs> {
    let dependent = &resolved.provisionables()[position];
    let mut outputs = LinkOutputs::new();

    for (name, link) in &dependent.links {
        let association = descriptor.association(name).ok_or_else(|| {
            StackForgeError::Config(format!(
                "Association '{}' is not declared by {}/{}",
                name, descriptor.provider, descriptor.kind
            ))
        })?;

        let link_output = match link {
            ResolvedLink::Absent => LinkOutput::Absent,
            ResolvedLink::One(target) => {
                LinkOutput::One(materialize_one(resolved, association, target, &dependent.config)?)
            }
            ResolvedLink::Many(targets) => LinkOutput::Many(
                targets
                    .iter()
                    .map(|target| materialize_one(resolved, association, target, &dependent.config))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        outputs.insert(name.clone(), link_output);
    }

    Ok(outputs)
}

fn materialize_one(
    resolved: &ResolvedStage,
    association: &AssociationDeclaration,
    target_name: &str,
    dependent: &ServiceConfiguration,
) -> Result<Output> {
    let target = resolved
        .get(target_name)
        .ok_or_else(|| StackForgeError::Config(format!("Unknown service '{}'", target_name)))?;

    if !target.is_provisioned() {
        return Err(StackForgeError::Config(format!(
            "Service '{}' has not been provisioned before its dependent",
            target_name
        )));
    }

    (association.materialize)(target, dependent)
}
