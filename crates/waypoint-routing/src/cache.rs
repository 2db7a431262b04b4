//! Route cache
//!
//! Serves the last successfully compiled route snapshot without locking on
//! the read path. The snapshot is computed on first use (once, even with
//! concurrent first callers) and replaced wholesale on refresh:
//!
//! - A refresh compiles in the background and publishes with an atomic swap;
//!   readers keep seeing the previous snapshot until then.
//! - A failed refresh keeps the previous snapshot.
//! - One refresh runs at a time; signals that arrive meanwhile collapse into
//!   a single follow-up refresh.
//!
//! Every recompute outcome is broadcast as a [`RefreshRoutesResult`].

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use waypoint_core::{GatewayError, RefreshRoutesResult, Result, Route};
use waypoint_observability::metrics::{MetricsSink, ROUTE_REFRESH};

use crate::compiler::{RouteLocator, RouteSnapshot};

const EVENT_CAPACITY: usize = 16;

pub struct CachingRouteLocator {
    delegate: Arc<dyn RouteLocator>,
    snapshot: ArcSwapOption<Vec<Arc<Route>>>,
    /// Serializes compiles; the read path never takes it once warm
    compute: Mutex<()>,
    refreshing: AtomicBool,
    pending: AtomicBool,
    events: broadcast::Sender<RefreshRoutesResult>,
    metrics: Arc<dyn MetricsSink>,
}

impl CachingRouteLocator {
    pub fn new(delegate: Arc<dyn RouteLocator>, metrics: Arc<dyn MetricsSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            delegate,
            snapshot: ArcSwapOption::const_empty(),
            compute: Mutex::new(()),
            refreshing: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            events,
            metrics,
        }
    }

    /// Receive the outcome of every subsequent recompute
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshRoutesResult> {
        self.events.subscribe()
    }

    /// Current snapshot, without computing one
    pub fn snapshot(&self) -> Option<RouteSnapshot> {
        self.snapshot.load_full()
    }

    /// Schedule a background recompute
    pub fn refresh(self: &Arc<Self>) {
        self.pending.store(true, Ordering::Release);
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Route refresh already in flight, coalescing");
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.drain_refreshes().await;
        });
    }

    async fn drain_refreshes(&self) {
        loop {
            while self.pending.swap(false, Ordering::AcqRel) {
                // failures are logged and broadcast by the recompute itself
                let _ = self.refresh_and_wait().await;
            }
            self.refreshing.store(false, Ordering::Release);

            // a signal may have landed between the last swap and the release
            if !self.pending.load(Ordering::Acquire)
                || self
                    .refreshing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
    }

    /// Recompute now and wait for the outcome
    pub async fn refresh_and_wait(&self) -> Result<RouteSnapshot> {
        let _guard = self.compute.lock().await;
        self.recompute().await
    }

    async fn recompute(&self) -> Result<RouteSnapshot> {
        let start = Instant::now();
        let result = self.delegate.get_routes().await.map(|compiled| {
            let mut routes = compiled.as_ref().clone();
            routes.sort_by_key(|route| route.order);
            Arc::new(routes)
        });

        match &result {
            Ok(routes) => {
                self.snapshot.store(Some(routes.clone()));
                info!(routes = routes.len(), "Route snapshot published");
                self.metrics.record(
                    ROUTE_REFRESH,
                    start.elapsed(),
                    &[
                        ("outcome", "success".to_string()),
                        ("routes", routes.len().to_string()),
                    ],
                );
                let _ = self.events.send(RefreshRoutesResult::success(routes.len()));
            }
            Err(error) => {
                warn!(error = %error, "Route refresh failed, keeping previous snapshot");
                self.metrics.record(
                    ROUTE_REFRESH,
                    start.elapsed(),
                    &[("outcome", "failure".to_string())],
                );
                let _ = self.events.send(RefreshRoutesResult::failure(
                    GatewayError::CacheRefresh(error.to_string()),
                ));
            }
        }
        result
    }
}

#[async_trait]
impl RouteLocator for CachingRouteLocator {
    async fn get_routes(&self) -> Result<RouteSnapshot> {
        if let Some(routes) = self.snapshot.load_full() {
            return Ok(routes);
        }

        let _guard = self.compute.lock().await;
        if let Some(routes) = self.snapshot.load_full() {
            return Ok(routes);
        }
        self.recompute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::always;
    use std::sync::atomic::AtomicUsize;
    use waypoint_observability::NoopMetrics;

    /// Locator producing routes `(id, order)` and counting its calls
    struct Fixed {
        routes: Vec<(&'static str, i32)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RouteLocator for Fixed {
        async fn get_routes(&self) -> Result<RouteSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(
                self.routes
                    .iter()
                    .map(|(id, order)| {
                        Arc::new(Route {
                            id: id.to_string(),
                            uri: http::Uri::from_static("http://backend"),
                            order: *order,
                            metadata: Default::default(),
                            predicate: always(),
                            filters: Vec::new(),
                        })
                    })
                    .collect(),
            ))
        }
    }

    #[tokio::test]
    async fn test_snapshot_sorted_by_order_then_declaration() {
        let delegate = Arc::new(Fixed {
            routes: vec![("c", 5), ("a", 0), ("b", 5), ("z", -1)],
            calls: AtomicUsize::new(0),
        });
        let cache = CachingRouteLocator::new(delegate.clone(), Arc::new(NoopMetrics));

        assert!(cache.snapshot().is_none());
        let routes = cache.get_routes().await.unwrap();
        let ids: Vec<&str> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "c", "b"]);

        cache.get_routes().await.unwrap();
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_and_wait_broadcasts_success() {
        let delegate = Arc::new(Fixed {
            routes: vec![("a", 0)],
            calls: AtomicUsize::new(0),
        });
        let cache = CachingRouteLocator::new(delegate, Arc::new(NoopMetrics));
        let mut events = cache.subscribe();

        cache.refresh_and_wait().await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(event.is_success());
    }
}
