//! Gateway assembly from a configuration file

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use waypoint_core::Dispatch;
use waypoint_routing::{DefaultCircuitBreakerFactory, Gateway, GatewayProperties};

use crate::config::{GatewayConfig, expand_home};
use crate::locator::FileRouteDefinitionLocator;
use crate::watcher::FileConfigWatcher;

/// Build a gateway whose routes come from the file at `path`
///
/// Routes are served through a [`FileRouteDefinitionLocator`], so later
/// refreshes re-read the file. The first compile runs before returning.
pub async fn build_gateway(
    path: impl Into<PathBuf>,
    dispatch: Arc<dyn Dispatch>,
) -> anyhow::Result<(Arc<Gateway>, GatewayConfig)> {
    let path = expand_home(path)?;
    let config = GatewayConfig::load(&path)
        .with_context(|| format!("loading gateway configuration from {}", path.display()))?;

    let properties = GatewayProperties {
        routes: Vec::new(),
        ..config.properties()
    };
    let gateway = Gateway::builder(dispatch)
        .properties(properties)
        .locator(Arc::new(FileRouteDefinitionLocator::new(&path)?))
        .circuit_breaker_factory(Arc::new(DefaultCircuitBreakerFactory::new(
            config.circuit_breaker.clone(),
        )))
        .build();

    gateway
        .routes_changed()
        .await
        .context("compiling initial routes")?;
    Ok((gateway, config))
}

/// Watches the file and refreshes the gateway's routes on every change
pub struct RouteRefresher {
    watcher: FileConfigWatcher,
    task: JoinHandle<()>,
}

impl RouteRefresher {
    pub fn watcher(&self) -> &FileConfigWatcher {
        &self.watcher
    }
}

impl Drop for RouteRefresher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Signal `gateway` every time the file at `path` changes
pub fn refresh_on_change(
    path: impl Into<PathBuf>,
    gateway: Arc<Gateway>,
) -> anyhow::Result<RouteRefresher> {
    let (watcher, mut changes) = FileConfigWatcher::watch(path)?;
    let task = tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            info!(version = change.version, "Configuration changed, refreshing routes");
            if let Err(error) = gateway.routes_changed().await {
                warn!(error = %error, "Route refresh after configuration change failed");
            }
        }
    });
    Ok(RouteRefresher { watcher, task })
}
