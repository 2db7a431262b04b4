//! Waypoint Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Waypoint:
//! - Declarative route definitions and their predicate/filter specs
//! - The per-request exchange and compiled route contracts
//! - Dispatch and route definition source abstractions
//! - Core error types

pub mod definition;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod exchange;
pub mod locator;
pub mod route;

pub use definition::{ComponentSpec, FilterSpec, PredicateSpec, RouteDefinition};
pub use dispatch::{Dispatch, ExchangeHandler};
pub use error::{ErrorKind, GatewayError, Result};
pub use events::RefreshRoutesResult;
pub use exchange::{Exchange, ExchangeAttributes, GatewayRequest, GatewayResponse};
pub use locator::{RouteDefinitionLocator, RouteDefinitionRepository, RouteDefinitionStream};
pub use route::{FilterChain, GatewayFilter, OrderedFilter, Route, RoutePredicate};
