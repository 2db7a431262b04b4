//! `CircuitBreaker` route filter
//!
//! Runs the rest of the chain under a breaker from the configured
//! [`ReactiveCircuitBreakerFactory`]. A response whose status is listed in
//! `statusCodes` counts as a failure. On any failure, or when the breaker is
//! open, the request is re-dispatched through the gateway to `fallbackUri`
//! with the triggering error attached to the exchange. Without a fallback the
//! error propagates, unless `resumeWithoutError` swallows it.

use async_trait::async_trait;
use futures::FutureExt;
use http::Uri;
use http::uri::PathAndQuery;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use waypoint_core::{Exchange, FilterChain, GatewayError, GatewayFilter, Result};
use waypoint_observability::metrics::{CIRCUIT_BREAKER_FALLBACK, MetricsSink};

use super::status::StatusMatcher;
use crate::args::BoundArgs;
use crate::circuit_breaker::{
    CallFuture, Fallback, ReactiveCircuitBreaker, ReactiveCircuitBreakerFactory,
};
use crate::gateway::HandlerSlot;
use crate::registry::{BuildContext, FilterFactory};

/// Local path (and optional query) a failed request is forwarded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackTarget {
    pub path: String,
    pub query: Option<String>,
}

impl FallbackTarget {
    /// Accepts `forward:/path?query` or a bare `/path?query`
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        let rest = match raw.split_once(':') {
            Some((scheme, rest))
                if !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
            {
                rest
            }
            _ => raw,
        };

        if rest.starts_with("//") {
            return Err(format!("fallback uri '{}' must not name a host", raw));
        }
        if !rest.starts_with('/') {
            return Err(format!("fallback uri '{}' must be an absolute path", raw));
        }
        PathAndQuery::try_from(rest)
            .map_err(|e| format!("invalid fallback uri '{}': {}", raw, e))?;

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string()).filter(|q| !q.is_empty())),
            None => (rest, None),
        };
        Ok(Self {
            path: path.to_string(),
            query,
        })
    }
}

impl fmt::Display for FallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "forward:{}?{}", self.path, query),
            None => write!(f, "forward:{}", self.path),
        }
    }
}

/// `CircuitBreaker=orders`, or expanded with `name`, `fallbackUri`,
/// `statusCodes` and `resumeWithoutError`. The breaker id is `name`, else
/// the route id.
pub struct CircuitBreakerFilterFactory {
    breakers: Arc<dyn ReactiveCircuitBreakerFactory>,
    handler: HandlerSlot,
    metrics: Arc<dyn MetricsSink>,
}

impl CircuitBreakerFilterFactory {
    pub fn new(
        breakers: Arc<dyn ReactiveCircuitBreakerFactory>,
        handler: HandlerSlot,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            breakers,
            handler,
            metrics,
        }
    }
}

impl FilterFactory for CircuitBreakerFilterFactory {
    fn name(&self) -> &str {
        "CircuitBreaker"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["name"]
    }

    fn build(&self, args: &BoundArgs, ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let name = args.optional("name").unwrap_or(ctx.route_id).to_string();
        let fallback = args
            .optional("fallbackUri")
            .map(FallbackTarget::parse)
            .transpose()
            .map_err(|e| args.error(e))?;
        let status_codes = args
            .list("statusCodes")
            .iter()
            .map(|code| code.parse::<StatusMatcher>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| args.error(e))?;
        let resume_without_error = args.flag("resumeWithoutError")?;

        Ok(Arc::new(CircuitBreakerFilter {
            breaker: self.breakers.create(&name),
            route_id: ctx.route_id.to_string(),
            name,
            fallback,
            status_codes,
            resume_without_error,
            handler: self.handler.clone(),
            metrics: self.metrics.clone(),
        }))
    }
}

struct CircuitBreakerFilter {
    route_id: String,
    name: String,
    breaker: Arc<dyn ReactiveCircuitBreaker>,
    fallback: Option<FallbackTarget>,
    status_codes: Vec<StatusMatcher>,
    resume_without_error: bool,
    handler: HandlerSlot,
    metrics: Arc<dyn MetricsSink>,
}

impl CircuitBreakerFilter {
    fn trips_on(&self, status: http::StatusCode) -> bool {
        self.status_codes.iter().any(|matcher| matcher.matches(status))
    }

    async fn fall_back(&self, exchange: &mut Exchange, error: GatewayError) -> Result<()> {
        let Some(target) = &self.fallback else {
            return Err(error);
        };
        let handler = self.handler.get().ok_or_else(|| {
            GatewayError::Internal("circuit breaker fallback has no gateway to forward to".to_string())
        })?;

        info!(
            breaker = %self.name,
            error = %error,
            fallback = %target,
            "Forwarding to circuit breaker fallback"
        );
        self.metrics.record(
            CIRCUIT_BREAKER_FALLBACK,
            Duration::ZERO,
            &[("name", self.name.clone())],
        );

        exchange.response.status = None;
        exchange.reset_routing();

        let query = target
            .query
            .clone()
            .or_else(|| exchange.request.query().map(str::to_string));
        exchange
            .request
            .set_path_and_query(&target.path, query.as_deref())?;
        if let Some(path_and_query) = exchange.request.uri.path_and_query().cloned() {
            exchange.request.uri = Uri::from(path_and_query);
        }
        exchange.attributes.circuit_breaker_error = Some(error);

        handler.forward(exchange).await
    }
}

#[async_trait]
impl GatewayFilter for CircuitBreakerFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        // primary and fallback never run concurrently; the lock only hands
        // the exchange from one to the other
        let cell = Mutex::new(exchange);
        let cell = &cell;

        let primary: CallFuture<'_> = async move {
            let mut guard = cell.lock().await;
            chain.proceed(&mut **guard).await?;
            match guard.response.status {
                Some(status) if self.trips_on(status) => Err(GatewayError::StatusTripped {
                    route_id: self.route_id.clone(),
                    name: self.name.clone(),
                    status,
                }),
                _ => Ok(()),
            }
        }
        .boxed();

        let fallback: Fallback<'_> = Box::new(move |error| {
            async move {
                let mut guard = cell.lock().await;
                self.fall_back(&mut **guard, error).await
            }
            .boxed()
        });

        match self.breaker.run(&self.route_id, primary, fallback).await {
            Err(error) if self.resume_without_error => {
                debug!(breaker = %self.name, error = %error, "Resuming without error");
                Ok(())
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        "CircuitBreaker"
    }
}
