use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tracing::info;
use waypoint_core::{
    GatewayError, Result, RouteDefinition, RouteDefinitionLocator, RouteDefinitionRepository,
    RouteDefinitionStream,
};

/// Mutable route source backed by memory, in insertion order.
///
/// Writers publish a new list; streams already handed out keep iterating
/// the list they started with.
#[derive(Default)]
pub struct InMemoryRouteDefinitionRepository {
    definitions: ArcSwap<Vec<RouteDefinition>>,
}

impl InMemoryRouteDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.definitions.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.load().is_empty()
    }
}

impl RouteDefinitionLocator for InMemoryRouteDefinitionRepository {
    fn route_definitions(&self) -> RouteDefinitionStream {
        let definitions = self.definitions.load_full();
        stream::iter((0..definitions.len()).map(move |i| Ok(definitions[i].clone()))).boxed()
    }
}

#[async_trait]
impl RouteDefinitionRepository for InMemoryRouteDefinitionRepository {
    async fn save(&self, definition: RouteDefinition) -> Result<()> {
        if definition.id.trim().is_empty() {
            return Err(GatewayError::Configuration {
                route_id: None,
                name: None,
                message: "route id must not be empty".to_string(),
            });
        }

        info!(route_id = %definition.id, "Saving route definition");
        self.definitions.rcu(|current| {
            let mut next = (**current).clone();
            match next.iter_mut().find(|existing| existing.id == definition.id) {
                Some(existing) => *existing = definition.clone(),
                None => next.push(definition.clone()),
            }
            next
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut removed = false;
        self.definitions.rcu(|current| {
            let mut next = (**current).clone();
            let before = next.len();
            next.retain(|definition| definition.id != id);
            removed = next.len() != before;
            next
        });

        if !removed {
            return Err(GatewayError::DefinitionNotFound { id: id.to_string() });
        }
        info!(route_id = id, "Deleted route definition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use waypoint_core::ErrorKind;

    async fn ids(repository: &InMemoryRouteDefinitionRepository) -> Vec<String> {
        repository
            .route_definitions()
            .map_ok(|definition| definition.id)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_inserts_and_replaces() {
        let repository = InMemoryRouteDefinitionRepository::new();
        repository.save(RouteDefinition::new("a", "http://a")).await.unwrap();
        repository.save(RouteDefinition::new("b", "http://b")).await.unwrap();
        repository
            .save(RouteDefinition::new("a", "http://a2"))
            .await
            .unwrap();

        assert_eq!(ids(&repository).await, vec!["a", "b"]);
        let first = repository.route_definitions().next().await.unwrap().unwrap();
        assert_eq!(first.uri, "http://a2");
    }

    #[tokio::test]
    async fn test_save_rejects_empty_id() {
        let repository = InMemoryRouteDefinitionRepository::new();
        let err = repository
            .save(RouteDefinition::new("  ", "http://a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let repository = InMemoryRouteDefinitionRepository::new();
        repository.save(RouteDefinition::new("a", "http://a")).await.unwrap();

        let err = repository.delete("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.route_id(), Some("missing"));

        repository.delete("a").await.unwrap();
        assert_eq!(repository.len(), 0);
    }

    #[tokio::test]
    async fn test_stream_is_a_snapshot() {
        let repository = InMemoryRouteDefinitionRepository::new();
        repository.save(RouteDefinition::new("a", "http://a")).await.unwrap();
        let stream = repository.route_definitions();
        repository.save(RouteDefinition::new("b", "http://b")).await.unwrap();

        let seen: Vec<RouteDefinition> = stream.try_collect().await.unwrap();
        assert_eq!(seen.len(), 1);
    }
}
