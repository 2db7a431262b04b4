//! Route definitions served straight from the configuration file

use futures::StreamExt;
use futures::stream;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use waypoint_core::{GatewayError, RouteDefinitionLocator, RouteDefinitionStream};

use crate::config::{GatewayConfig, expand_home};
use crate::error::ConfigFileError;

/// Re-reads the file's `routes` on every compile, so a refresh after an edit
/// picks up the new definitions
///
/// A file that cannot be read or parsed yields a single error item.
#[derive(Debug, Clone)]
pub struct FileRouteDefinitionLocator {
    path: PathBuf,
}

impl FileRouteDefinitionLocator {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigFileError> {
        Ok(Self {
            path: expand_home(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteDefinitionLocator for FileRouteDefinitionLocator {
    fn route_definitions(&self) -> RouteDefinitionStream {
        let path = self.path.clone();
        stream::once(async move { GatewayConfig::load_file(&path) })
            .flat_map(|loaded| match loaded {
                Ok(config) => {
                    debug!(routes = config.routes.len(), "Read route definitions from file");
                    stream::iter(config.routes.into_iter().map(Ok)).boxed()
                }
                Err(error) => {
                    warn!(error = %error, "Failed to read route definitions from file");
                    stream::iter([Err(GatewayError::from(error))]).boxed()
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use waypoint_core::ErrorKind;

    async fn ids(locator: &FileRouteDefinitionLocator) -> Vec<String> {
        locator
            .route_definitions()
            .map(|item| item.unwrap().id)
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_rereads_file_each_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.yaml");
        std::fs::write(&path, "routes:\n  - id: orders\n    uri: http://orders\n").unwrap();

        let locator = FileRouteDefinitionLocator::new(&path).unwrap();
        assert_eq!(ids(&locator).await, vec!["orders"]);

        std::fs::write(
            &path,
            "routes:\n  - id: orders\n    uri: http://orders\n  - id: carts\n    uri: http://carts\n",
        )
        .unwrap();
        assert_eq!(ids(&locator).await, vec!["orders", "carts"]);
    }

    #[tokio::test]
    async fn test_unreadable_file_yields_one_error() {
        let dir = TempDir::new().unwrap();
        let locator = FileRouteDefinitionLocator::new(dir.path().join("missing.yaml")).unwrap();

        let items: Vec<_> = locator.route_definitions().collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].as_ref().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }
}
