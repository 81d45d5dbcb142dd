use std::collections::BTreeSet;

use crate::project::{ProjectConfiguration, ServiceConfiguration, Stage};
use crate::registry::descriptor::{Provider, ServiceKind};
use crate::registry::ServiceRegistry;

/// Derives the full, ordered service list for one stage: implicit stage-level
/// services first (one provider instance per provider in use, then the state
/// and secrets backends the project configures), followed by the explicit
/// services with project defaults applied. Implicit services are only
/// synthesized when the registry actually carries a descriptor for the
/// (provider, kind) pair.
pub fn stage_services(
    project: &ProjectConfiguration,
    stage: &Stage,
    registry: &ServiceRegistry,
) -> Vec<ServiceConfiguration> {
    let explicit: Vec<ServiceConfiguration> =
        stage.services.iter().map(|service| with_project_defaults(service, project)).collect();

    let mut services = Vec::with_capacity(explicit.len() + 3);

    // One provider instance per provider used within the stage, pinned to the
    // first region that provider appears with
    let mut providers_covered: BTreeSet<Provider> = BTreeSet::new();
    for service in &explicit {
        if providers_covered.contains(&service.provider)
            || !registry.contains(service.provider, ServiceKind::Provider)
        {
            continue;
        }
        providers_covered.insert(service.provider);
        services.push(ServiceConfiguration {
            name: format!("{}-provider-service", service.provider),
            kind: ServiceKind::Provider,
            provider: service.provider,
            region: service.region.clone(),
            attributes: serde_json::Map::new(),
        });
    }

    if let Some(state) = backend_service(project, ServiceKind::State, "project-state", registry) {
        services.push(state);
    }
    if let Some(secrets) =
        backend_service(project, ServiceKind::Secrets, "project-secrets", registry)
    {
        services.push(secrets);
    }

    services.extend(explicit);

    tracing::debug!(
        stage = %stage.name,
        declared = stage.services.len(),
        total = services.len(),
        "derived stage service list"
    );

    services
}

/// Applies the project-level provider and region defaults to a service entry.
/// The region default only applies when the service runs on the project's own
/// provider; foreign providers keep their region unset unless stated.
fn with_project_defaults(
    service: &ServiceConfiguration,
    project: &ProjectConfiguration,
) -> ServiceConfiguration {
    let mut service = service.clone();
    if service.region.is_none() && service.provider == project.provider {
        service.region = Some(project.region.clone());
    }
    service
}

/// An unconfigured backend stays out of the stage entirely; only a project
/// that declares one gets the implicit service.
fn backend_service(
    project: &ProjectConfiguration,
    kind: ServiceKind,
    name: &str,
    registry: &ServiceRegistry,
) -> Option<ServiceConfiguration> {
    let backend = match kind {
        ServiceKind::State => project.state.as_ref(),
        ServiceKind::Secrets => project.secrets.as_ref(),
        _ => None,
    }?;

    let provider = backend.provider.unwrap_or(project.provider);
    if !registry.contains(provider, kind) {
        return None;
    }

    let region = backend.region.clone().or_else(|| Some(project.region.clone()));

    Some(ServiceConfiguration {
        name: name.to_string(),
        kind,
        provider,
        region,
        attributes: backend.attributes.clone(),
    })
}
