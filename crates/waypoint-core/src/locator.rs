//! Route definition sources
//!
//! The `RouteDefinitionLocator` trait abstracts over where route definitions
//! come from: static configuration, service discovery, or a mutable
//! repository fed by an admin API.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{Result, definition::RouteDefinition};

/// Stream of definitions produced by a locator
pub type RouteDefinitionStream = BoxStream<'static, Result<RouteDefinition>>;

/// Source of route definitions
///
/// Each call yields a fresh snapshot; the route cache calls it once per
/// compile. An `Err` item is attributed to that single definition and handled
/// according to the compiler's fail-fast setting.
pub trait RouteDefinitionLocator: Send + Sync {
    fn route_definitions(&self) -> RouteDefinitionStream;
}

/// Locator whose contents can be changed at runtime
///
/// # Errors
/// - `save` fails with a configuration error when the id is empty
/// - `delete` fails with `DefinitionNotFound` when no definition has that id
#[async_trait]
pub trait RouteDefinitionRepository: RouteDefinitionLocator {
    /// Insert or replace the definition with the same id
    async fn save(&self, definition: RouteDefinition) -> Result<()>;

    /// Remove the definition with `id`
    async fn delete(&self, id: &str) -> Result<()>;
}
