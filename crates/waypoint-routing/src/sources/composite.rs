use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use waypoint_core::{RouteDefinitionLocator, RouteDefinitionStream};

/// Concatenates its delegates' definitions in delegate order
#[derive(Clone, Default)]
pub struct CompositeRouteDefinitionLocator {
    delegates: Vec<Arc<dyn RouteDefinitionLocator>>,
}

impl CompositeRouteDefinitionLocator {
    pub fn new(delegates: Vec<Arc<dyn RouteDefinitionLocator>>) -> Self {
        Self { delegates }
    }
}

impl RouteDefinitionLocator for CompositeRouteDefinitionLocator {
    fn route_definitions(&self) -> RouteDefinitionStream {
        let streams: Vec<RouteDefinitionStream> = self
            .delegates
            .iter()
            .map(|delegate| delegate.route_definitions())
            .collect();
        stream::iter(streams).flatten().boxed()
    }
}
