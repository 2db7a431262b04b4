//! Waypoint Observability
//!
//! This crate provides observability features:
//! - Metrics collection (Prometheus) behind the `MetricsSink` trait
//! - Structured logging initialization

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, LoggingConfig, LoggingError};
pub use metrics::{MetricsSink, Metrics, NoopMetrics};
