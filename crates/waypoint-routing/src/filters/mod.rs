//! Gateway filters
//!
//! Route filter factories registered by name, plus the global filters the
//! gateway wraps around every route chain.

mod circuit_breaker;
mod headers;
mod metrics;
mod prefix_path;
mod rewrite_path;
mod route_to_request_url;
mod set_status;
pub mod status;
mod strip_prefix;

use std::sync::Arc;

use crate::registry::FactoryRegistry;

pub use circuit_breaker::{CircuitBreakerFilterFactory, FallbackTarget};
pub use headers::{AddRequestHeaderFilterFactory, AddResponseHeaderFilterFactory};
pub use metrics::{GATEWAY_METRICS_FILTER_ORDER, GatewayMetricsFilter};
pub use prefix_path::PrefixPathFilterFactory;
pub use rewrite_path::{RewritePathFilterFactory, unescape_replacement};
pub use route_to_request_url::{ROUTE_TO_URL_FILTER_ORDER, RouteToRequestUrlFilter};
pub use set_status::SetStatusFilterFactory;
pub use strip_prefix::StripPrefixFilterFactory;

/// Filters that need no collaborators; the circuit breaker factory is
/// registered by the gateway builder once its dependencies exist
pub(crate) fn register_builtins(registry: &mut FactoryRegistry) {
    registry.register_filter(Arc::new(AddRequestHeaderFilterFactory));
    registry.register_filter(Arc::new(AddResponseHeaderFilterFactory));
    registry.register_filter(Arc::new(PrefixPathFilterFactory));
    registry.register_filter(Arc::new(RewritePathFilterFactory));
    registry.register_filter(Arc::new(SetStatusFilterFactory));
    registry.register_filter(Arc::new(StripPrefixFilterFactory));
}
