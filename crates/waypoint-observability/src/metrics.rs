//! Metrics collection with Prometheus
//!
//! Routing components report timed operations through the [`MetricsSink`]
//! trait as `(component, duration, outcome tags)`. [`Metrics`] maps the known
//! components onto Prometheus collectors:
//! - Gateway request latency by route, outcome, status and method
//! - Route refresh outcomes and the number of active routes
//! - Circuit breaker fallback invocations
//!
//! Unknown components land in a generic duration histogram.

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Duration;

/// One request through the gateway handler
pub const GATEWAY_REQUESTS: &str = "gateway.requests";
/// One route cache recompute; tags: `outcome`, `routes`
pub const ROUTE_REFRESH: &str = "route.refresh";
/// One circuit breaker fallback; tags: `name`
pub const CIRCUIT_BREAKER_FALLBACK: &str = "circuit_breaker.fallback";

/// Receiver of timed measurements from the routing engine
pub trait MetricsSink: Send + Sync {
    fn record(&self, component: &str, duration: Duration, tags: &[(&'static str, String)]);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _component: &str, _duration: Duration, _tags: &[(&'static str, String)]) {}
}

fn tag<'a>(tags: &'a [(&'static str, String)], key: &str) -> &'a str {
    tags.iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.as_str())
        .unwrap_or("")
}

/// Metrics collector for Waypoint
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// End-to-end gateway request duration
    pub gateway_requests_seconds: HistogramVec,
    /// Route refresh attempts by outcome
    pub route_refresh_total: CounterVec,
    /// Routes in the last published snapshot
    pub routes_active: Gauge,
    /// Circuit breaker fallbacks by breaker name
    pub circuit_breaker_fallbacks_total: CounterVec,
    /// Durations reported for any other component
    pub component_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let gateway_requests_seconds = HistogramVec::new(
            HistogramOpts::new(
                "waypoint_gateway_requests_seconds",
                "Gateway request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["route_id", "route_uri", "outcome", "status", "method"],
        )?;

        let route_refresh_total = CounterVec::new(
            Opts::new(
                "waypoint_route_refresh_total",
                "Route cache refresh attempts",
            ),
            &["outcome"],
        )?;

        let routes_active = Gauge::with_opts(Opts::new(
            "waypoint_routes_active",
            "Number of routes in the served snapshot",
        ))?;

        let circuit_breaker_fallbacks_total = CounterVec::new(
            Opts::new(
                "waypoint_circuit_breaker_fallbacks_total",
                "Circuit breaker fallback invocations",
            ),
            &["name"],
        )?;

        let component_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "waypoint_component_duration_seconds",
                "Duration of other instrumented operations in seconds",
            ),
            &["component", "outcome"],
        )?;

        registry.register(Box::new(gateway_requests_seconds.clone()))?;
        registry.register(Box::new(route_refresh_total.clone()))?;
        registry.register(Box::new(routes_active.clone()))?;
        registry.register(Box::new(circuit_breaker_fallbacks_total.clone()))?;
        registry.register(Box::new(component_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            gateway_requests_seconds,
            route_refresh_total,
            routes_active,
            circuit_breaker_fallbacks_total,
            component_duration_seconds,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl MetricsSink for Metrics {
    fn record(&self, component: &str, duration: Duration, tags: &[(&'static str, String)]) {
        match component {
            GATEWAY_REQUESTS => {
                self.gateway_requests_seconds
                    .with_label_values(&[
                        tag(tags, "route_id"),
                        tag(tags, "route_uri"),
                        tag(tags, "outcome"),
                        tag(tags, "status"),
                        tag(tags, "method"),
                    ])
                    .observe(duration.as_secs_f64());
            }
            ROUTE_REFRESH => {
                self.route_refresh_total
                    .with_label_values(&[tag(tags, "outcome")])
                    .inc();
                if let Ok(count) = tag(tags, "routes").parse::<f64>() {
                    self.routes_active.set(count);
                }
            }
            CIRCUIT_BREAKER_FALLBACK => {
                self.circuit_breaker_fallbacks_total
                    .with_label_values(&[tag(tags, "name")])
                    .inc();
            }
            other => {
                self.component_duration_seconds
                    .with_label_values(&[other, tag(tags, "outcome")])
                    .observe(duration.as_secs_f64());
            }
        }
    }
}
