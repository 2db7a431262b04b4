//! Error types for Waypoint Core

use http::StatusCode;
use thiserror::Error;

/// Coarse classification used for fallback decisions and metrics tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown factory, missing or invalid argument, failed validation
    Configuration,
    /// No compiled route matched the request
    NotFound,
    /// Malformed request data (URI, header)
    InvalidRequest,
    /// Breaker trip, breaker open, downstream failure or timeout
    Upstream,
    /// Route compile failure during a background refresh
    CacheRefresh,
    /// Anything else
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Upstream => "upstream",
            ErrorKind::CacheRefresh => "cache_refresh",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors are cloneable so that a triggering error can be attached to the
/// exchange while the same error keeps propagating.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("Configuration error{}: {message}", context_suffix(.route_id, .name))]
    Configuration {
        route_id: Option<String>,
        name: Option<String>,
        message: String,
    },

    #[error("No route matched {method} {path}")]
    NotFound { method: String, path: String },

    #[error("Route definition '{id}' not found")]
    DefinitionNotFound { id: String },

    #[error("Upstream error for route '{route_id}': {message}")]
    Upstream { route_id: String, message: String },

    #[error("Circuit breaker '{name}' on route '{route_id}' does not permit further calls")]
    CallNotPermitted { route_id: String, name: String },

    #[error("Circuit breaker '{name}' on route '{route_id}' tripped on response status {status}")]
    StatusTripped {
        route_id: String,
        name: String,
        status: StatusCode,
    },

    #[error("Circuit breaker '{name}' on route '{route_id}' timed out after {timeout_ms}ms")]
    Timeout {
        route_id: String,
        name: String,
        timeout_ms: u64,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Route refresh failed: {0}")]
    CacheRefresh(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn context_suffix(route_id: &Option<String>, name: &Option<String>) -> String {
    match (route_id, name) {
        (Some(route_id), Some(name)) => format!(" in route '{}' ({})", route_id, name),
        (Some(route_id), None) => format!(" in route '{}'", route_id),
        (None, Some(name)) => format!(" ({})", name),
        (None, None) => String::new(),
    }
}

impl GatewayError {
    /// Configuration error not yet attributed to a route
    pub fn config(name: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Configuration {
            route_id: None,
            name: Some(name.into()),
            message: message.into(),
        }
    }

    /// Attach a route id to a configuration or upstream error that lacks one
    pub fn for_route(self, id: &str) -> Self {
        match self {
            GatewayError::Configuration {
                route_id: None,
                name,
                message,
            } => GatewayError::Configuration {
                route_id: Some(id.to_string()),
                name,
                message,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Configuration { .. } => ErrorKind::Configuration,
            GatewayError::NotFound { .. } | GatewayError::DefinitionNotFound { .. } => {
                ErrorKind::NotFound
            }
            GatewayError::Upstream { .. }
            | GatewayError::CallNotPermitted { .. }
            | GatewayError::StatusTripped { .. }
            | GatewayError::Timeout { .. } => ErrorKind::Upstream,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GatewayError::CacheRefresh(_) => ErrorKind::CacheRefresh,
            GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Status an error responder should render for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } | GatewayError::DefinitionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::CallNotPermitted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::StatusTripped { status, .. } => *status,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Configuration { .. }
            | GatewayError::CacheRefresh(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn route_id(&self) -> Option<&str> {
        match self {
            GatewayError::Configuration { route_id, .. } => route_id.as_deref(),
            GatewayError::Upstream { route_id, .. }
            | GatewayError::CallNotPermitted { route_id, .. }
            | GatewayError::StatusTripped { route_id, .. }
            | GatewayError::Timeout { route_id, .. }
            | GatewayError::DefinitionNotFound { id: route_id } => Some(route_id),
            _ => None,
        }
    }

    /// Factory or breaker name the error was raised by, when known
    pub fn component_name(&self) -> Option<&str> {
        match self {
            GatewayError::Configuration { name, .. } => name.as_deref(),
            GatewayError::CallNotPermitted { name, .. }
            | GatewayError::StatusTripped { name, .. }
            | GatewayError::Timeout { name, .. } => Some(name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
