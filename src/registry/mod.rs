pub mod descriptor;
pub mod graph;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

pub use descriptor::{
    AssociationDeclaration, Cardinality, Materializer, Provider, ProvisionHandler,
    SelectorPredicate, ServiceDescriptor, ServiceKind, TargetSelector,
};
pub use graph::{CycleInfo, DependencyGraph};

use crate::error::{Result, StackForgeError};

/// Table of (provider, service kind) to descriptor. Populated once at
/// startup, then sealed: any later registration attempt is an error. A sealed
/// registry is what operations thread through resolution, so descriptors can
/// never change under a running operation.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    descriptors: BTreeMap<(Provider, ServiceKind), ServiceDescriptor>,
    sealed: bool,
}

impl ServiceRegistry {
    /// Creates a new, empty, unsealed registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor under its (provider, kind) key
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> Result<()> {
        let (provider, kind) = descriptor.key();

        if self.sealed {
            return Err(StackForgeError::DuplicateRegistration { provider, kind, sealed: true });
        }

        match self.descriptors.entry((provider, kind)) {
            Entry::Occupied(_) => {
                Err(StackForgeError::DuplicateRegistration { provider, kind, sealed: false })
            }
            Entry::Vacant(entry) => {
                tracing::debug!(%provider, %kind, "registered service descriptor");
                entry.insert(descriptor);
                Ok(())
            }
        }
    }

    /// Seals the registry against further writes
    pub fn seal(&mut self) {
        self.sealed = true;
        tracing::info!(descriptors = self.descriptors.len(), "service registry sealed");
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Finds the descriptor for a (provider, kind) pair
    pub fn lookup(&self, provider: Provider, kind: ServiceKind) -> Result<&ServiceDescriptor> {
        self.descriptors
            .get(&(provider, kind))
            .ok_or(StackForgeError::UnknownService { provider, kind })
    }

    pub fn contains(&self, provider: Provider, kind: ServiceKind) -> bool {
        self.descriptors.contains_key(&(provider, kind))
    }

    /// All registered descriptors, in key order
    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.values()
    }

    /// The distinct providers with at least one registered descriptor
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> =
            self.descriptors.keys().map(|(provider, _)| *provider).collect();
        providers.dedup();
        providers
    }

    /// The distinct service kinds with at least one registered descriptor
    pub fn kinds(&self) -> Vec<ServiceKind> {
        let mut kinds: Vec<ServiceKind> = self.descriptors.keys().map(|(_, kind)| *kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// The service kinds available for a given provider
    pub fn kinds_for(&self, provider: Provider) -> Vec<ServiceKind> {
        self.descriptors
            .keys()
            .filter(|(p, _)| *p == provider)
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn descriptor(provider: Provider, kind: ServiceKind) -> ServiceDescriptor {
        ServiceDescriptor::new(
            provider,
            kind,
            json!({ "type": "object" }),
            Arc::new(|_, _, _| Ok(json!({}))),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ServiceRegistry::new();
        registry.register(descriptor(Provider::Aws, ServiceKind::Mysql)).unwrap();

        let found = registry.lookup(Provider::Aws, ServiceKind::Mysql).unwrap();
        assert_eq!(found.key(), (Provider::Aws, ServiceKind::Mysql));
    }

    #[test]
    fn test_lookup_unknown_service() {
        let registry = ServiceRegistry::new();
        match registry.lookup(Provider::Local, ServiceKind::Redis) {
            Err(StackForgeError::UnknownService { provider, kind }) => {
                assert_eq!(provider, Provider::Local);
                assert_eq!(kind, ServiceKind::Redis);
            }
            other => panic!("expected UnknownService, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ServiceRegistry::new();
        registry.register(descriptor(Provider::Aws, ServiceKind::Networking)).unwrap();

        match registry.register(descriptor(Provider::Aws, ServiceKind::Networking)) {
            Err(StackForgeError::DuplicateRegistration { sealed: false, .. }) => {}
            other => panic!("expected DuplicateRegistration, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_after_seal_fails() {
        let mut registry = ServiceRegistry::new();
        registry.register(descriptor(Provider::Aws, ServiceKind::Networking)).unwrap();
        registry.seal();
        assert!(registry.is_sealed());

        match registry.register(descriptor(Provider::Aws, ServiceKind::Mysql)) {
            Err(StackForgeError::DuplicateRegistration { sealed: true, .. }) => {}
            other => panic!("expected sealed DuplicateRegistration, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_and_kind_enumeration() {
        let mut registry = ServiceRegistry::new();
        registry.register(descriptor(Provider::Aws, ServiceKind::Mysql)).unwrap();
        registry.register(descriptor(Provider::Aws, ServiceKind::Networking)).unwrap();
        registry.register(descriptor(Provider::Local, ServiceKind::Networking)).unwrap();

        assert_eq!(registry.providers(), vec![Provider::Aws, Provider::Local]);
        assert_eq!(registry.kinds(), vec![ServiceKind::Mysql, ServiceKind::Networking]);
        assert_eq!(registry.kinds_for(Provider::Local), vec![ServiceKind::Networking]);
    }
}
