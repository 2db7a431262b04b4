//! Gateway handler
//!
//! Ties the routing engine together: weight selection, route lookup over the
//! cached snapshot, and the filter chain around the terminal dispatch.
//! [`GatewayBuilder`] wires the registry, breaker backend, weight calculator
//! and route sources into one [`Gateway`].

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use waypoint_core::route::sort_filters;
use waypoint_core::{
    Dispatch, Exchange, ExchangeHandler, FilterChain, GatewayError, OrderedFilter, Result, Route,
    RouteDefinitionLocator,
};
use waypoint_observability::{MetricsSink, NoopMetrics};

use crate::cache::CachingRouteLocator;
use crate::circuit_breaker::{DefaultCircuitBreakerFactory, ReactiveCircuitBreakerFactory};
use crate::compiler::{RouteDefinitionRouteLocator, RouteLocator};
use crate::filters::{
    CircuitBreakerFilterFactory, GATEWAY_METRICS_FILTER_ORDER, GatewayMetricsFilter,
    ROUTE_TO_URL_FILTER_ORDER, RouteToRequestUrlFilter,
};
use crate::properties::GatewayProperties;
use crate::registry::{FactoryRegistry, FilterFactory, PredicateFactory};
use crate::sources::{CompositeRouteDefinitionLocator, PropertiesRouteDefinitionLocator};
use crate::weight::{WeightCalculator, WeightRandom};

/// Late-bound reference to the gateway, for components built before it
/// exists (the circuit breaker fallback forwards through it)
#[derive(Clone, Default)]
pub struct HandlerSlot(Arc<OnceCell<Weak<dyn ExchangeHandler>>>);

impl HandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the handler; only the first bind takes effect
    pub fn bind(&self, handler: &Arc<dyn ExchangeHandler>) -> bool {
        self.0.set(Arc::downgrade(handler)).is_ok()
    }

    pub fn get(&self) -> Option<Arc<dyn ExchangeHandler>> {
        self.0.get().and_then(Weak::upgrade)
    }
}

pub struct Gateway {
    routes: Arc<CachingRouteLocator>,
    weights: Arc<WeightCalculator>,
    global_filters: Vec<OrderedFilter>,
    dispatch: Arc<dyn Dispatch>,
}

impl Gateway {
    pub fn builder(dispatch: Arc<dyn Dispatch>) -> GatewayBuilder {
        GatewayBuilder::new(dispatch)
    }

    pub fn routes(&self) -> &Arc<CachingRouteLocator> {
        &self.routes
    }

    pub fn weights(&self) -> &Arc<WeightCalculator> {
        &self.weights
    }

    /// Signal that route definitions changed; see
    /// [`WeightCalculator::on_routes_changed`]
    pub async fn routes_changed(&self) -> Result<()> {
        self.weights.on_routes_changed(&self.routes).await
    }

    /// First route, in snapshot order, whose predicate accepts the exchange
    pub async fn lookup_route(&self, exchange: &mut Exchange) -> Result<Arc<Route>> {
        let routes = self.routes.get_routes().await?;
        for route in routes.iter() {
            exchange.attributes.predicate_route_id = Some(route.id.clone());
            match route.predicate.test(exchange).await {
                Ok(true) => return Ok(route.clone()),
                Ok(false) => {}
                Err(error) => {
                    warn!(route_id = %route.id, error = %error, "Error applying predicate for route");
                }
            }
        }

        Err(GatewayError::NotFound {
            method: exchange.request.method.to_string(),
            path: exchange.request.path().to_string(),
        })
    }

    async fn route_and_run(&self, exchange: &mut Exchange) -> Result<()> {
        let route = self.lookup_route(exchange).await?;
        debug!(
            exchange_id = %exchange.id,
            route_id = %route.id,
            path = %exchange.request.path(),
            "Mapped request to route"
        );

        let mut filters: Vec<OrderedFilter> = self
            .global_filters
            .iter()
            .chain(route.filters.iter())
            .cloned()
            .collect();
        sort_filters(&mut filters);
        exchange.attributes.route = Some(route);

        FilterChain::new(&filters, self.dispatch.as_ref())
            .proceed(exchange)
            .await
    }
}

#[async_trait]
impl ExchangeHandler for Gateway {
    async fn handle(&self, exchange: &mut Exchange) -> Result<()> {
        self.weights.select(exchange);
        self.route_and_run(exchange).await
    }

    async fn forward(&self, exchange: &mut Exchange) -> Result<()> {
        debug!(exchange_id = %exchange.id, path = %exchange.request.path(), "Forwarding exchange");
        self.route_and_run(exchange).await
    }
}

pub struct GatewayBuilder {
    dispatch: Arc<dyn Dispatch>,
    properties: GatewayProperties,
    locators: Vec<Arc<dyn RouteDefinitionLocator>>,
    registry: FactoryRegistry,
    breakers: Arc<dyn ReactiveCircuitBreakerFactory>,
    metrics: Arc<dyn MetricsSink>,
    random: Option<Arc<dyn WeightRandom>>,
}

impl GatewayBuilder {
    pub fn new(dispatch: Arc<dyn Dispatch>) -> Self {
        Self {
            dispatch,
            properties: GatewayProperties::default(),
            locators: Vec::new(),
            registry: FactoryRegistry::with_builtins(),
            breakers: Arc::new(DefaultCircuitBreakerFactory::default()),
            metrics: Arc::new(NoopMetrics),
            random: None,
        }
    }

    /// Static routes, default filters and the fail-fast setting
    pub fn properties(mut self, properties: GatewayProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Additional route source, consulted after the static routes
    pub fn locator(mut self, locator: Arc<dyn RouteDefinitionLocator>) -> Self {
        self.locators.push(locator);
        self
    }

    pub fn predicate_factory(mut self, factory: Arc<dyn PredicateFactory>) -> Self {
        self.registry.register_predicate(factory);
        self
    }

    pub fn filter_factory(mut self, factory: Arc<dyn FilterFactory>) -> Self {
        self.registry.register_filter(factory);
        self
    }

    pub fn circuit_breaker_factory(mut self, breakers: Arc<dyn ReactiveCircuitBreakerFactory>) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn weight_random(mut self, random: Arc<dyn WeightRandom>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn build(self) -> Arc<Gateway> {
        let Self {
            dispatch,
            properties,
            locators,
            mut registry,
            breakers,
            metrics,
            random,
        } = self;

        let slot = HandlerSlot::new();
        let weights = Arc::new(match random {
            Some(random) => WeightCalculator::with_random(random),
            None => WeightCalculator::new(),
        });

        registry.register_filter(Arc::new(CircuitBreakerFilterFactory::new(
            breakers,
            slot.clone(),
            metrics.clone(),
        )));
        registry.add_predicate_args_listener(weights.clone());
        registry.log_loaded();

        let mut sources: Vec<Arc<dyn RouteDefinitionLocator>> = vec![Arc::new(
            PropertiesRouteDefinitionLocator::new(properties.routes.clone()),
        )];
        sources.extend(locators);
        let definitions = Arc::new(CompositeRouteDefinitionLocator::new(sources));

        let compiler: Arc<dyn RouteLocator> = Arc::new(RouteDefinitionRouteLocator::new(
            definitions,
            Arc::new(registry),
            &properties,
        ));
        let routes = Arc::new(CachingRouteLocator::new(compiler, metrics.clone()));

        let global_filters = vec![
            OrderedFilter::new(
                GATEWAY_METRICS_FILTER_ORDER,
                Arc::new(GatewayMetricsFilter::new(metrics)),
            ),
            OrderedFilter::new(ROUTE_TO_URL_FILTER_ORDER, Arc::new(RouteToRequestUrlFilter)),
        ];

        let gateway = Arc::new(Gateway {
            routes,
            weights,
            global_filters,
            dispatch,
        });
        let handler: Arc<dyn ExchangeHandler> = gateway.clone();
        slot.bind(&handler);
        gateway
    }
}
