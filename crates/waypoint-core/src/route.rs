//! Compiled routes and the filter chain
//!
//! A [`Route`] is the executable form of a route definition: one composed
//! predicate plus an ordered list of filters. Filters run onion-style through
//! [`FilterChain`]: each filter receives the exchange and the remainder of the
//! chain, and decides whether, when and how to continue. The terminal stage
//! is a [`Dispatch`].

use async_trait::async_trait;
use http::Uri;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::Dispatch;
use crate::error::Result;
use crate::exchange::Exchange;

/// Boolean test over an inbound request
#[async_trait]
pub trait RoutePredicate: Send + Sync {
    async fn test(&self, exchange: &Exchange) -> Result<bool>;
}

/// Middleware stage around the rest of the chain
#[async_trait]
pub trait GatewayFilter: Send + Sync {
    /// Run this stage; call `chain.proceed(exchange)` to continue inward
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()>;

    /// Name used in logs and debug output
    fn name(&self) -> &str;

    /// Explicit chain position; `None` means "use the declaration position"
    fn order(&self) -> Option<i32> {
        None
    }
}

/// A filter together with its position in the chain
#[derive(Clone)]
pub struct OrderedFilter {
    pub order: i32,
    pub filter: Arc<dyn GatewayFilter>,
}

impl OrderedFilter {
    pub fn new(order: i32, filter: Arc<dyn GatewayFilter>) -> Self {
        Self { order, filter }
    }
}

impl fmt::Debug for OrderedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedFilter")
            .field("order", &self.order)
            .field("name", &self.filter.name())
            .finish()
    }
}

/// Sort filters ascending by order; equal orders keep their relative position
pub fn sort_filters(filters: &mut [OrderedFilter]) {
    filters.sort_by_key(|filter| filter.order);
}

/// Remaining filters plus the terminal dispatch
#[derive(Clone, Copy)]
pub struct FilterChain<'a> {
    filters: &'a [OrderedFilter],
    dispatch: &'a dyn Dispatch,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [OrderedFilter], dispatch: &'a dyn Dispatch) -> Self {
        Self { filters, dispatch }
    }

    /// Number of filters still ahead of the dispatch
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }

    /// Invoke the next filter, or the dispatch once the filters are exhausted
    pub async fn proceed(self, exchange: &mut Exchange) -> Result<()> {
        match self.filters.split_first() {
            Some((head, rest)) => {
                let next = FilterChain {
                    filters: rest,
                    dispatch: self.dispatch,
                };
                head.filter.filter(exchange, next).await
            }
            None => self.dispatch.dispatch(exchange).await,
        }
    }
}

/// Compiled, executable route
#[derive(Clone)]
pub struct Route {
    pub id: String,
    pub uri: Uri,
    pub order: i32,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub predicate: Arc<dyn RoutePredicate>,
    /// Filters sorted ascending by order
    pub filters: Vec<OrderedFilter>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("order", &self.order)
            .field("metadata", &self.metadata)
            .field("filters", &self.filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::GatewayRequest;
    use std::sync::Mutex;

    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl GatewayFilter for Recording {
        async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("in:{}", self.label));
            let result = chain.proceed(exchange).await;
            self.log.lock().unwrap().push(format!("out:{}", self.label));
            result
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl GatewayFilter for ShortCircuit {
        async fn filter(&self, exchange: &mut Exchange, _chain: FilterChain<'_>) -> Result<()> {
            exchange.response.status = Some(http::StatusCode::FORBIDDEN);
            Ok(())
        }

        fn name(&self) -> &str {
            "ShortCircuit"
        }
    }

    struct LoggingDispatch {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Dispatch for LoggingDispatch {
        async fn dispatch(&self, exchange: &mut Exchange) -> Result<()> {
            self.log.lock().unwrap().push("dispatch".to_string());
            exchange.response.status = Some(http::StatusCode::OK);
            Ok(())
        }
    }

    fn recording(order: i32, label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> OrderedFilter {
        OrderedFilter::new(
            order,
            Arc::new(Recording {
                label,
                log: log.clone(),
            }),
        )
    }

    #[tokio::test]
    async fn test_chain_runs_onion_style() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut filters = vec![
            recording(2, "b", &log),
            recording(1, "a", &log),
            recording(3, "c", &log),
        ];
        sort_filters(&mut filters);
        let dispatch = LoggingDispatch { log: log.clone() };

        let mut exchange = Exchange::new(GatewayRequest::get("/"));
        FilterChain::new(&filters, &dispatch)
            .proceed(&mut exchange)
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["in:a", "in:b", "in:c", "dispatch", "out:c", "out:b", "out:a"]
        );
        assert_eq!(exchange.response.status, Some(http::StatusCode::OK));
    }

    #[tokio::test]
    async fn test_filter_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let filters = vec![
            OrderedFilter::new(0, Arc::new(ShortCircuit)),
            recording(1, "never", &log),
        ];
        let dispatch = LoggingDispatch { log: log.clone() };

        let mut exchange = Exchange::new(GatewayRequest::get("/"));
        FilterChain::new(&filters, &dispatch)
            .proceed(&mut exchange)
            .await
            .unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(exchange.response.status, Some(http::StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_sort_filters_is_stable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut filters = vec![
            recording(1, "first", &log),
            recording(0, "zero", &log),
            recording(1, "second", &log),
        ];
        sort_filters(&mut filters);
        let names: Vec<&str> = filters.iter().map(|f| f.filter.name()).collect();
        assert_eq!(names, vec!["zero", "first", "second"]);
    }
}
