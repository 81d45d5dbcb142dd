//! Builtin service descriptors for the supported providers. Each builder
//! returns a descriptor wired with the associations that kind of service
//! needs; callers register them into a [`ServiceRegistry`] and seal it.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::operation::{LinkOutput, Output, Provisionable};
use crate::registry::descriptor::{
    AssociationDeclaration, Cardinality, Provider, ProvisionHandler, ServiceDescriptor,
    ServiceKind, TargetSelector,
};
use crate::registry::ServiceRegistry;
use crate::schema::attributes::{
    schema_fragment, ApplicationAttributes, CacheAttributes, DatabaseAttributes,
    NetworkingAttributes, ObjectStoreAttributes, ProviderAttributes, SecretsAttributes,
    StateAttributes,
};
use crate::Result;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_MARIADB_PORT: u16 = 3306;
pub const DEFAULT_POSTGRESQL_PORT: u16 = 5432;
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// Every non-provider service depends on its provider's instance being in
/// place first
pub fn provider_requirement() -> AssociationDeclaration {
    AssociationDeclaration::passthrough(
        "providerInstance",
        TargetSelector::Kind { kind: ServiceKind::Provider, same_provider: true },
        Cardinality::RequiredOne,
    )
}

/// Network-attached services require the stage's network fabric from the same
/// provider
pub fn networking_requirement() -> AssociationDeclaration {
    AssociationDeclaration::passthrough(
        "networking",
        TargetSelector::Kind { kind: ServiceKind::Networking, same_provider: true },
        Cardinality::RequiredOne,
    )
}

fn base_output(provisionable: &Provisionable) -> Value {
    json!({
        "name": provisionable.name,
        "resource": provisionable.resource_id,
        "provider": provisionable.config.provider.as_str(),
        "type": provisionable.config.kind.as_str(),
        "region": provisionable.config.region,
    })
}

fn handler_with(extra: impl Fn(&Provisionable) -> Value + Send + Sync + 'static) -> ProvisionHandler {
    Arc::new(move |provisionable, _sink, links| {
        let mut output = base_output(provisionable);
        if let Some(object) = output.as_object_mut() {
            if let Value::Object(fields) = extra(provisionable) {
                object.extend(fields);
            }
            let linked: Vec<&str> = links
                .iter()
                .filter(|(_, link)| !matches!(link, LinkOutput::Absent))
                .map(|(name, _)| name.as_str())
                .collect();
            if !linked.is_empty() {
                object.insert("links".to_string(), json!(linked));
            }
        }
        Ok(output)
    })
}

pub fn provider_descriptor(provider: Provider) -> ServiceDescriptor {
    ServiceDescriptor::new(
        provider,
        ServiceKind::Provider,
        schema_fragment::<ProviderAttributes>(),
        handler_with(|_| json!({})),
    )
}

pub fn networking_descriptor(provider: Provider) -> ServiceDescriptor {
    ServiceDescriptor::new(
        provider,
        ServiceKind::Networking,
        schema_fragment::<NetworkingAttributes>(),
        handler_with(|p| {
            json!({ "cidr": p.config.attribute("cidr").cloned().unwrap_or(json!("10.0.0.0/16")) })
        }),
    )
    .with_association(provider_requirement())
}

pub fn state_descriptor(provider: Provider) -> ServiceDescriptor {
    ServiceDescriptor::new(
        provider,
        ServiceKind::State,
        schema_fragment::<StateAttributes>(),
        handler_with(|p| json!({ "bucket": p.config.attribute("bucket") })),
    )
    .with_association(provider_requirement())
    // State backends outlive their stage; tearing a stage down leaves them in
    // place so the destruction itself stays recorded
    .with_destroy_handler(Arc::new(|provisionable, _sink, _links| {
        tracing::info!(service = %provisionable.name, "state backend retained on destroy");
        Ok(Output::Null)
    }))
}

pub fn secrets_descriptor(provider: Provider) -> ServiceDescriptor {
    ServiceDescriptor::new(
        provider,
        ServiceKind::Secrets,
        schema_fragment::<SecretsAttributes>(),
        handler_with(|p| json!({ "path": p.config.attribute("path") })),
    )
    .with_association(provider_requirement())
}

pub fn database_descriptor(provider: Provider, kind: ServiceKind) -> ServiceDescriptor {
    let default_port = match kind {
        ServiceKind::Postgresql => DEFAULT_POSTGRESQL_PORT,
        ServiceKind::Mariadb => DEFAULT_MARIADB_PORT,
        _ => DEFAULT_MYSQL_PORT,
    };

    ServiceDescriptor::new(
        provider,
        kind,
        schema_fragment::<DatabaseAttributes>(),
        handler_with(move |p| {
            json!({
                "database": p.config.attribute("database"),
                "port": p.config.attribute("port").cloned().unwrap_or(json!(default_port)),
            })
        }),
    )
    .with_association(provider_requirement())
    .with_association(networking_requirement())
}

pub fn cache_descriptor(provider: Provider, kind: ServiceKind) -> ServiceDescriptor {
    let default_port = match kind {
        ServiceKind::Memcached => DEFAULT_MEMCACHED_PORT,
        _ => DEFAULT_REDIS_PORT,
    };

    ServiceDescriptor::new(
        provider,
        kind,
        schema_fragment::<CacheAttributes>(),
        handler_with(move |p| {
            json!({ "port": p.config.attribute("port").cloned().unwrap_or(json!(default_port)) })
        }),
    )
    .with_association(provider_requirement())
    .with_association(networking_requirement())
}

pub fn object_store_descriptor(provider: Provider) -> ServiceDescriptor {
    ServiceDescriptor::new(
        provider,
        ServiceKind::ObjectStore,
        schema_fragment::<ObjectStoreAttributes>(),
        handler_with(|p| json!({ "bucket": p.config.attribute("bucket") })),
    )
    .with_association(provider_requirement())
}

pub fn application_descriptor(provider: Provider) -> ServiceDescriptor {
    ServiceDescriptor::new(
        provider,
        ServiceKind::Application,
        schema_fragment::<ApplicationAttributes>(),
        handler_with(|p| json!({ "image": p.config.attribute("image") })),
    )
    .with_association(provider_requirement())
    .with_association(networking_requirement())
    .with_association(AssociationDeclaration::passthrough(
        "databases",
        TargetSelector::Kind { kind: ServiceKind::Mysql, same_provider: true },
        Cardinality::Many,
    ))
    .with_association(AssociationDeclaration::passthrough(
        "cache",
        TargetSelector::Kind { kind: ServiceKind::Redis, same_provider: true },
        Cardinality::Optional,
    ))
}

/// Registers the full builtin catalog for one provider
pub fn register_provider_services(
    registry: &mut ServiceRegistry,
    provider: Provider,
) -> Result<()> {
    registry.register(provider_descriptor(provider))?;
    registry.register(networking_descriptor(provider))?;
    registry.register(state_descriptor(provider))?;
    registry.register(secrets_descriptor(provider))?;
    registry.register(database_descriptor(provider, ServiceKind::Mysql))?;
    registry.register(database_descriptor(provider, ServiceKind::Mariadb))?;
    registry.register(database_descriptor(provider, ServiceKind::Postgresql))?;
    registry.register(cache_descriptor(provider, ServiceKind::Redis))?;
    registry.register(cache_descriptor(provider, ServiceKind::Memcached))?;
    registry.register(object_store_descriptor(provider))?;
    registry.register(application_descriptor(provider))?;
    Ok(())
}

/// The default sealed registry with every builtin service for every provider
pub fn default_registry() -> Result<ServiceRegistry> {
    let mut registry = ServiceRegistry::new();
    register_provider_services(&mut registry, Provider::Aws)?;
    register_provider_services(&mut registry, Provider::Local)?;
    registry.seal();
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_registry_is_sealed_and_complete() {
        let registry = default_registry().unwrap();
        assert!(registry.is_sealed());
        // 11 kinds for each of the two providers
        assert_eq!(registry.len(), 22);
        assert!(registry.contains(Provider::Aws, ServiceKind::Mysql));
        assert!(registry.contains(Provider::Local, ServiceKind::State));
    }

    #[test]
    fn test_database_descriptor_wires_both_requirements() {
        let descriptor = database_descriptor(Provider::Aws, ServiceKind::Mysql);
        assert!(descriptor.association("providerInstance").is_some());
        assert!(descriptor.association("networking").is_some());
        assert!(descriptor.association("cache").is_none());
    }

    #[test]
    fn test_state_descriptor_declares_destroy_handler() {
        let descriptor = state_descriptor(Provider::Aws);
        assert!(descriptor.destroy_handler.is_some());
        assert!(networking_descriptor(Provider::Aws).destroy_handler.is_none());
    }
}
