//! Routes derived from a service registry
//!
//! One route per registered service that has at least one instance. The
//! route id is `{prefix}{service_id}`, the URI comes from `url_template`
//! (`lb://{service_id}` by default) and every configured predicate and
//! filter argument is rendered with the service's placeholders. The default
//! templates route `/{service_id}/**` and strip that first segment.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use waypoint_core::definition::generated_key;
use waypoint_core::{
    ComponentSpec, FilterSpec, PredicateSpec, Result, RouteDefinition, RouteDefinitionLocator,
    RouteDefinitionStream,
};

/// One registered instance of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Read access to a service registry
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Client name, used for the default route id prefix
    fn name(&self) -> String;

    async fn services(&self) -> Result<Vec<String>>;

    async fn instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryLocatorProperties {
    pub enabled: bool,
    /// Route id prefix; defaults to `{client name}_`
    pub route_id_prefix: Option<String>,
    /// Route URI template; placeholders `{service_id}`, `{host}`, `{port}`
    pub url_template: String,
    /// Lower-case the service id in predicate and filter arguments
    pub lower_case_service_id: bool,
    pub predicates: Vec<PredicateSpec>,
    pub filters: Vec<FilterSpec>,
}

impl Default for DiscoveryLocatorProperties {
    fn default() -> Self {
        Self {
            enabled: false,
            route_id_prefix: None,
            url_template: "lb://{service_id}".to_string(),
            lower_case_service_id: false,
            predicates: vec![ComponentSpec::new("Path").with_arg(generated_key(0), "/{service_id}/**")],
            filters: vec![
                ComponentSpec::new("RewritePath")
                    .with_arg("regexp", "/{service_id}/?(?<remaining>.*)")
                    .with_arg("replacement", "/${remaining}"),
            ],
        }
    }
}

fn render(template: &str, service_id: &str, instance: &ServiceInstance) -> String {
    template
        .replace("{service_id}", service_id)
        .replace("{host}", &instance.host)
        .replace("{port}", &instance.port.to_string())
}

fn render_spec(spec: &ComponentSpec, service_id: &str, instance: &ServiceInstance) -> ComponentSpec {
    ComponentSpec {
        name: spec.name.clone(),
        args: spec
            .args
            .iter()
            .map(|(key, value)| (key.clone(), render(value, service_id, instance)))
            .collect(),
    }
}

pub struct DiscoveryClientRouteDefinitionLocator {
    client: Arc<dyn DiscoveryClient>,
    properties: Arc<DiscoveryLocatorProperties>,
    route_id_prefix: String,
}

impl DiscoveryClientRouteDefinitionLocator {
    pub fn new(client: Arc<dyn DiscoveryClient>, properties: DiscoveryLocatorProperties) -> Self {
        let route_id_prefix = properties
            .route_id_prefix
            .clone()
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or_else(|| format!("{}_", client.name()));
        Self {
            client,
            properties: Arc::new(properties),
            route_id_prefix,
        }
    }

    pub fn route_id_prefix(&self) -> &str {
        &self.route_id_prefix
    }
}

async fn discover(
    client: &dyn DiscoveryClient,
    properties: &DiscoveryLocatorProperties,
    prefix: &str,
) -> Result<Vec<RouteDefinition>> {
    let mut definitions = Vec::new();

    for service_id in client.services().await? {
        let instances = client.instances(&service_id).await?;
        let Some(instance) = instances.first() else {
            debug!(service_id = %service_id, "Skipping service without instances");
            continue;
        };

        let templated_id = if properties.lower_case_service_id {
            service_id.to_lowercase()
        } else {
            service_id.clone()
        };

        let mut definition = RouteDefinition::new(
            format!("{}{}", prefix, service_id),
            render(&properties.url_template, &service_id, instance),
        );
        definition.metadata = instance
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
            .collect();
        definition.predicates = properties
            .predicates
            .iter()
            .map(|spec| render_spec(spec, &templated_id, instance))
            .collect();
        definition.filters = properties
            .filters
            .iter()
            .map(|spec| render_spec(spec, &templated_id, instance))
            .collect();

        debug!(route_id = %definition.id, uri = %definition.uri, "Discovered route");
        definitions.push(definition);
    }

    Ok(definitions)
}

impl RouteDefinitionLocator for DiscoveryClientRouteDefinitionLocator {
    fn route_definitions(&self) -> RouteDefinitionStream {
        let client = self.client.clone();
        let properties = self.properties.clone();
        let prefix = self.route_id_prefix.clone();

        stream::once(async move { discover(client.as_ref(), &properties, &prefix).await })
            .flat_map(|discovered| match discovered {
                Ok(definitions) => stream::iter(definitions.into_iter().map(Ok)).boxed(),
                Err(error) => stream::iter(vec![Err(error)]).boxed(),
            })
            .boxed()
    }
}
