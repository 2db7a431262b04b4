//! Route compiler
//!
//! Turns the definitions produced by a [`RouteDefinitionLocator`] into
//! executable [`Route`]s. Each definition resolves its predicate and filter
//! specs through the [`FactoryRegistry`]; default filters are prepended to
//! the route's own filters, every filter gets an order (explicit, else its
//! position) and the list is stably sorted.
//!
//! With `fail_on_route_definition_error` set, the first invalid definition
//! aborts the compile. Otherwise invalid definitions are skipped with a
//! warning and the remaining routes are still produced.

use async_trait::async_trait;
use futures::StreamExt;
use http::Uri;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use waypoint_core::route::sort_filters;
use waypoint_core::{
    FilterSpec, GatewayError, OrderedFilter, Result, Route, RouteDefinition,
    RouteDefinitionLocator,
};

use crate::predicates::all_of;
use crate::properties::GatewayProperties;
use crate::registry::{BuiltPredicate, FactoryRegistry};

/// Shared, immutable set of compiled routes
pub type RouteSnapshot = Arc<Vec<Arc<Route>>>;

/// Source of compiled routes
#[async_trait]
pub trait RouteLocator: Send + Sync {
    async fn get_routes(&self) -> Result<RouteSnapshot>;
}

/// Compiles route definitions into routes on every call
pub struct RouteDefinitionRouteLocator {
    definitions: Arc<dyn RouteDefinitionLocator>,
    registry: Arc<FactoryRegistry>,
    default_filters: Vec<FilterSpec>,
    fail_fast: bool,
}

fn route_error(id: &str, message: String) -> GatewayError {
    GatewayError::Configuration {
        route_id: Some(id.to_string()),
        name: None,
        message,
    }
}

impl RouteDefinitionRouteLocator {
    pub fn new(
        definitions: Arc<dyn RouteDefinitionLocator>,
        registry: Arc<FactoryRegistry>,
        properties: &GatewayProperties,
    ) -> Self {
        Self {
            definitions,
            registry,
            default_filters: properties.default_filters.clone(),
            fail_fast: properties.fail_on_route_definition_error,
        }
    }

    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    fn compile_definition(&self, definition: &RouteDefinition) -> Result<(Route, Vec<BuiltPredicate>)> {
        let id = definition.id.as_str();
        if id.trim().is_empty() {
            return Err(GatewayError::Configuration {
                route_id: None,
                name: None,
                message: "route id must not be empty".to_string(),
            });
        }

        let uri: Uri = definition
            .uri
            .parse()
            .map_err(|e| route_error(id, format!("invalid uri '{}': {}", definition.uri, e)))?;
        if uri.scheme().is_none() {
            return Err(route_error(
                id,
                format!("uri '{}' must include a scheme", definition.uri),
            ));
        }

        let predicates = definition
            .predicates
            .iter()
            .map(|spec| {
                self.registry
                    .build_predicate(id, spec)
                    .map_err(|e| e.for_route(id))
            })
            .collect::<Result<Vec<_>>>()?;
        let predicate = all_of(predicates.iter().map(|built| built.predicate.clone()));

        let mut filters = Vec::with_capacity(self.default_filters.len() + definition.filters.len());
        for (position, spec) in self
            .default_filters
            .iter()
            .chain(definition.filters.iter())
            .enumerate()
        {
            let filter = self
                .registry
                .build_filter(id, spec)
                .map_err(|e| e.for_route(id))?;
            let order = filter
                .order()
                .unwrap_or_else(|| i32::try_from(position + 1).unwrap_or(i32::MAX));
            filters.push(OrderedFilter::new(order, filter));
        }
        sort_filters(&mut filters);

        let route = Route {
            id: id.to_string(),
            uri,
            order: definition.order,
            metadata: definition.metadata.clone(),
            predicate,
            filters,
        };
        Ok((route, predicates))
    }

    /// Compile every definition, in declaration order
    ///
    /// Predicate arguments reach the registry's listeners only once the whole
    /// set has compiled, so an aborted compile leaves them untouched.
    pub async fn compile(&self) -> Result<Vec<Arc<Route>>> {
        let mut definitions = self.definitions.route_definitions();
        let mut routes = Vec::new();
        let mut ids = HashSet::new();
        let mut published = Vec::new();

        while let Some(item) = definitions.next().await {
            let compiled = item.and_then(|definition| {
                if ids.contains(&definition.id) {
                    return Err(route_error(
                        &definition.id,
                        "duplicate route id".to_string(),
                    ));
                }
                self.compile_definition(&definition)
            });

            match compiled {
                Ok((route, predicates)) => {
                    debug!(
                        route_id = %route.id,
                        order = route.order,
                        filters = route.filters.len(),
                        "Compiled route"
                    );
                    ids.insert(route.id.clone());
                    published.push((route.id.clone(), predicates));
                    routes.push(Arc::new(route));
                }
                Err(error) if self.fail_fast => return Err(error),
                Err(error) => {
                    warn!(
                        route_id = error.route_id().unwrap_or("unknown"),
                        error = %error,
                        "Skipping invalid route definition"
                    );
                }
            }
        }

        for (route_id, predicates) in &published {
            self.registry.publish_predicate_args(route_id, predicates);
        }
        self.registry.publish_routes_compiled(&ids);
        Ok(routes)
    }
}

#[async_trait]
impl RouteLocator for RouteDefinitionRouteLocator {
    async fn get_routes(&self) -> Result<RouteSnapshot> {
        Ok(Arc::new(self.compile().await?))
    }
}
