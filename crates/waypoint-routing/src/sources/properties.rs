use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use waypoint_core::{RouteDefinition, RouteDefinitionLocator, RouteDefinitionStream};

/// Routes declared in static configuration
#[derive(Debug, Clone, Default)]
pub struct PropertiesRouteDefinitionLocator {
    routes: Arc<Vec<RouteDefinition>>,
}

impl PropertiesRouteDefinitionLocator {
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }
}

impl RouteDefinitionLocator for PropertiesRouteDefinitionLocator {
    fn route_definitions(&self) -> RouteDefinitionStream {
        let routes = self.routes.clone();
        stream::iter((0..routes.len()).map(move |i| Ok(routes[i].clone()))).boxed()
    }
}
