//! File-based configuration for Waypoint gateways
//!
//! Loads a [`GatewayConfig`] from a YAML or TOML file, serves its routes
//! through a [`FileRouteDefinitionLocator`] that re-reads the file on every
//! compile, and watches the file so edits trigger a route refresh.
//!
//! # Example
//! ```no_run
//! # use std::sync::Arc;
//! # use waypoint_core::Dispatch;
//! # async fn example(dispatch: Arc<dyn Dispatch>) -> anyhow::Result<()> {
//! let (gateway, config) =
//!     waypoint_config_file::build_gateway("~/.waypoint/gateway.yaml", dispatch).await?;
//! waypoint_observability::logging::init(&config.logging)?;
//! let _refresher = waypoint_config_file::refresh_on_change("~/.waypoint/gateway.yaml", gateway)?;
//! # Ok(())
//! # }
//! ```

mod bootstrap;
mod config;
mod error;
mod locator;
mod watcher;

pub use bootstrap::{RouteRefresher, build_gateway, refresh_on_change};
pub use config::{ConfigFormat, ENV_FAIL_FAST, ENV_LOG_LEVEL, GatewayConfig, expand_home};
pub use error::ConfigFileError;
pub use locator::FileRouteDefinitionLocator;
pub use watcher::{ConfigChange, FileConfigWatcher};
