//! Route refresh notifications

use chrono::{DateTime, Utc};

use crate::error::GatewayError;

/// Outcome of one route cache recompute
#[derive(Debug, Clone)]
pub enum RefreshRoutesResult {
    /// A new snapshot was published
    Success {
        route_count: usize,
        at: DateTime<Utc>,
    },
    /// The recompute failed; the previous snapshot is still served
    Failure {
        error: GatewayError,
        at: DateTime<Utc>,
    },
}

impl RefreshRoutesResult {
    pub fn success(route_count: usize) -> Self {
        RefreshRoutesResult::Success {
            route_count,
            at: Utc::now(),
        }
    }

    pub fn failure(error: GatewayError) -> Self {
        RefreshRoutesResult::Failure {
            error,
            at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RefreshRoutesResult::Success { .. })
    }

    pub fn error(&self) -> Option<&GatewayError> {
        match self {
            RefreshRoutesResult::Failure { error, .. } => Some(error),
            RefreshRoutesResult::Success { .. } => None,
        }
    }
}
