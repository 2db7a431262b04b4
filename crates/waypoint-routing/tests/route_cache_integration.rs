//! Integration tests for the route cache over real route sources

use futures::StreamExt;
use futures::stream;
use mockall::mock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use waypoint_core::{
    ErrorKind, RouteDefinition, RouteDefinitionLocator, RouteDefinitionRepository,
    RouteDefinitionStream,
};
use waypoint_observability::NoopMetrics;
use waypoint_routing::{
    CachingRouteLocator, FactoryRegistry, GatewayProperties, InMemoryRouteDefinitionRepository,
    RouteDefinitionRouteLocator, RouteLocator,
};

mock! {
    Definitions {}

    impl RouteDefinitionLocator for Definitions {
        fn route_definitions(&self) -> RouteDefinitionStream;
    }
}

/// Wraps a locator and counts how often it is asked for definitions
struct Counting {
    inner: Arc<dyn RouteDefinitionLocator>,
    calls: AtomicUsize,
}

impl RouteDefinitionLocator for Counting {
    fn route_definitions(&self) -> RouteDefinitionStream {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.route_definitions()
    }
}

fn cache_over(definitions: Arc<dyn RouteDefinitionLocator>) -> Arc<CachingRouteLocator> {
    let compiler = RouteDefinitionRouteLocator::new(
        definitions,
        Arc::new(FactoryRegistry::with_builtins()),
        &GatewayProperties::default(),
    );
    Arc::new(CachingRouteLocator::new(
        Arc::new(compiler),
        Arc::new(NoopMetrics),
    ))
}

fn route(id: &str) -> RouteDefinition {
    RouteDefinition::new(id, format!("http://{}:8080", id))
        .with_predicate(format!("Path=/{}/**", id).parse().unwrap())
}

async fn ids(cache: &CachingRouteLocator) -> Vec<String> {
    cache
        .get_routes()
        .await
        .unwrap()
        .iter()
        .map(|r| r.id.clone())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_callers_share_one_compile() {
    let mut definitions = MockDefinitions::new();
    definitions.expect_route_definitions().times(1).returning(|| {
        stream::once(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(route("orders"))
        })
        .boxed()
    });
    let cache = cache_over(Arc::new(definitions));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.get_routes().await.unwrap() }));
    }

    let mut snapshots = Vec::new();
    for handle in handles {
        snapshots.push(handle.await.unwrap());
    }
    assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    assert_eq!(snapshots[0].len(), 1);
}

#[tokio::test]
async fn test_saved_definition_visible_after_refresh() {
    let repository = Arc::new(InMemoryRouteDefinitionRepository::new());
    repository.save(route("orders")).await.unwrap();
    let cache = cache_over(repository.clone());

    assert_eq!(ids(&cache).await, vec!["orders"]);

    repository.save(route("carts")).await.unwrap();
    assert_eq!(ids(&cache).await, vec!["orders"]);

    let mut events = cache.subscribe();
    cache.refresh();
    let event = events.recv().await.unwrap();
    assert!(event.is_success());
    assert_eq!(ids(&cache).await, vec!["orders", "carts"]);

    repository.delete("orders").await.unwrap();
    cache.refresh_and_wait().await.unwrap();
    assert_eq!(ids(&cache).await, vec!["carts"]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_routes() {
    let repository = Arc::new(InMemoryRouteDefinitionRepository::new());
    repository.save(route("orders")).await.unwrap();
    let cache = cache_over(repository.clone());
    let before = cache.get_routes().await.unwrap();

    repository
        .save(RouteDefinition::new("broken", "http://broken").with_predicate("Nope=1".parse().unwrap()))
        .await
        .unwrap();

    let mut events = cache.subscribe();
    cache.refresh();
    let event = events.recv().await.unwrap();
    assert!(!event.is_success());
    assert_eq!(event.error().map(|e| e.kind()), Some(ErrorKind::CacheRefresh));

    let after = cache.get_routes().await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_refresh_signals_coalesce() {
    let repository = Arc::new(InMemoryRouteDefinitionRepository::new());
    repository.save(route("orders")).await.unwrap();
    let counting = Arc::new(Counting {
        inner: repository,
        calls: AtomicUsize::new(0),
    });
    let cache = cache_over(counting.clone());

    let mut events = cache.subscribe();
    for _ in 0..10 {
        cache.refresh();
    }
    assert!(events.recv().await.unwrap().is_success());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert!(events.try_recv().is_err());
}
