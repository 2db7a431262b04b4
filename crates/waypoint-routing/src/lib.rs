//! Waypoint Routing Engine
//!
//! This crate turns route definitions into a live request pipeline:
//! - Predicate and filter factories, bound by name
//! - Route compilation and the cached, refreshable route snapshot
//! - Weighted traffic splitting
//! - Circuit breaker filter with fallback forwarding
//! - The gateway handler running filter chains around the dispatch
//! - Route definition sources (static, in-memory, discovery, composite)

pub mod args;
pub mod cache;
pub mod circuit_breaker;
pub mod compiler;
pub mod filters;
pub mod gateway;
pub mod predicates;
pub mod properties;
pub mod registry;
pub mod sources;
pub mod weight;

// Re-export commonly used types
pub use args::{BoundArgs, ShortcutType};
pub use cache::CachingRouteLocator;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, DefaultCircuitBreakerFactory,
    ReactiveCircuitBreaker, ReactiveCircuitBreakerFactory,
};
pub use compiler::{RouteDefinitionRouteLocator, RouteLocator, RouteSnapshot};
pub use gateway::{Gateway, GatewayBuilder, HandlerSlot};
pub use properties::GatewayProperties;
pub use registry::{
    BuildContext, FactoryRegistry, FilterFactory, PredicateArgsListener, PredicateFactory,
};
pub use sources::{
    CompositeRouteDefinitionLocator, DiscoveryClient, DiscoveryClientRouteDefinitionLocator,
    DiscoveryLocatorProperties, InMemoryRouteDefinitionRepository,
    PropertiesRouteDefinitionLocator, ServiceInstance,
};
pub use weight::{ThreadRandom, WeightCalculator, WeightGroupConfig, WeightRandom};
