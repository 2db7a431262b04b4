//! Route-level gateway settings

use serde::{Deserialize, Serialize};
use waypoint_core::{FilterSpec, RouteDefinition};

/// Statically configured routes plus the compile settings that apply to
/// every route source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayProperties {
    /// Routes served by the properties locator
    pub routes: Vec<RouteDefinition>,
    /// Filters applied to every route, ahead of its own filters
    pub default_filters: Vec<FilterSpec>,
    /// Abort the whole compile on the first invalid definition
    pub fail_on_route_definition_error: bool,
}

impl Default for GatewayProperties {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            default_filters: Vec::new(),
            fail_on_route_definition_error: true,
        }
    }
}
