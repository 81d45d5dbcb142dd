use std::collections::HashMap;

use crate::error::{Result, StackForgeError};
use crate::operation::provisionable::{Provisionable, ResolvedLink};
use crate::project::ServiceConfiguration;
use crate::registry::descriptor::Cardinality;
use crate::registry::{DependencyGraph, ServiceRegistry};

/// Resolves one stage: instantiates a provisionable per service, evaluates
/// every declared association against the sibling set and derives the
/// dependency graph plus the deterministic provisioning order. Resolution is
/// pure discovery; no handler or materializer runs here.
pub struct StageResolver<'r> {
    registry: &'r ServiceRegistry,
}

impl<'r> StageResolver<'r> {
    pub fn new(registry: &'r ServiceRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve(
        &self,
        stage_name: &str,
        configs: Vec<ServiceConfiguration>,
    ) -> Result<ResolvedStage> {
        let mut provisionables = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());
        let mut warnings = Vec::new();

        // Every service must have a descriptor before anything else happens
        for (position, config) in configs.iter().enumerate() {
            self.registry.lookup(config.provider, config.kind)?;

            if index.insert(config.name.clone(), position).is_some() {
                return Err(StackForgeError::Config(format!(
                    "Duplicate service name '{}' in stage '{}'",
                    config.name, stage_name
                )));
            }
            provisionables.push(Provisionable::new(config.clone()));
        }

        // Discovery pass: decide which siblings satisfy each association
        for (position, config) in configs.iter().enumerate() {
            let descriptor = self.registry.lookup(config.provider, config.kind)?;

            for association in &descriptor.associations {
                let matches: Vec<String> = configs
                    .iter()
                    .enumerate()
                    .filter(|(candidate_position, candidate)| {
                        *candidate_position != position
                            && association.selector.matches(config, candidate)
                    })
                    .map(|(_, candidate)| candidate.name.clone())
                    .collect();

                let link = match association.cardinality {
                    Cardinality::RequiredOne => match matches.len() {
                        1 => ResolvedLink::One(matches.into_iter().next().unwrap_or_default()),
                        found => {
                            return Err(StackForgeError::AssociationResolution {
                                service: config.name.clone(),
                                association: association.name.clone(),
                                matches: found,
                            })
                        }
                    },
                    Cardinality::Optional => match matches.len() {
                        0 => {
                            warnings.push(format!(
                                "Optional association '{}' of service '{}' matched no sibling",
                                association.name, config.name
                            ));
                            ResolvedLink::Absent
                        }
                        1 => ResolvedLink::One(matches.into_iter().next().unwrap_or_default()),
                        found => {
                            return Err(StackForgeError::AssociationResolution {
                                service: config.name.clone(),
                                association: association.name.clone(),
                                matches: found,
                            })
                        }
                    },
                    Cardinality::Many => ResolvedLink::Many(matches),
                };

                provisionables[position].links.insert(association.name.clone(), link);
            }
        }

        // Edge from every resolved dependency to its dependent
        let mut graph = DependencyGraph::new();
        for provisionable in &provisionables {
            graph.add_node(provisionable.name.clone());
        }
        for provisionable in &provisionables {
            for link in provisionable.links.values() {
                for target in link.targets() {
                    graph.add_edge(target.to_string(), provisionable.name.clone());
                }
            }
        }

        let order = graph.topological_order()?;
        tracing::debug!(stage = stage_name, ?order, "resolved provisioning order");

        Ok(ResolvedStage {
            stage: stage_name.to_string(),
            provisionables,
            index,
            graph,
            order,
            warnings,
        })
    }
}

/// The outcome of resolving one stage: provisionables with their links, the
/// dependency graph and the deterministic provisioning order. Reusable across
/// operation kinds without re-running resolution.
#[derive(Debug)]
pub struct ResolvedStage {
    pub stage: String,
    provisionables: Vec<Provisionable>,
    index: HashMap<String, usize>,
    pub graph: DependencyGraph,
    order: Vec<String>,
    warnings: Vec<String>,
}

impl ResolvedStage {
    /// Dependencies-first order for provisioning
    pub fn provisioning_order(&self) -> &[String] {
        &self.order
    }

    /// Dependents-first order for teardown
    pub fn teardown_order(&self) -> Vec<String> {
        let mut order = self.order.clone();
        order.reverse();
        order
    }

    pub fn provisionables(&self) -> &[Provisionable] {
        &self.provisionables
    }

    pub fn get(&self, name: &str) -> Option<&Provisionable> {
        self.index.get(name).map(|&i| &self.provisionables[i])
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StackForgeError::Config(format!("Unknown service '{}'", name)))
    }

    pub(crate) fn attach_output(&mut self, position: usize, output: crate::operation::Output) {
        self.provisionables[position].output = Some(output);
    }
}
