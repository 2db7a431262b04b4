use async_trait::async_trait;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use super::pattern::AntPattern;
use crate::args::{BoundArgs, ShortcutType};
use crate::registry::{BuildContext, PredicateFactory};

/// `Host=**.example.org,api.example.com`: host without port matches any
/// pattern, case-insensitively, with `.` as the segment separator
pub struct HostPredicateFactory;

struct HostPredicate {
    patterns: Vec<AntPattern>,
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // bracketed IPv6 literal
        return host.split_once(']').map_or(host, |(literal, _)| &literal[1..]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

#[async_trait]
impl RoutePredicate for HostPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        let Some(host) = exchange.request.host() else {
            return Ok(false);
        };
        let host = strip_port(host);
        Ok(self.patterns.iter().any(|pattern| pattern.matches(host)))
    }
}

impl PredicateFactory for HostPredicateFactory {
    fn name(&self) -> &str {
        "Host"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["patterns"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let patterns = args
            .required_list("patterns")?
            .iter()
            .map(|pattern| {
                AntPattern::compile(pattern, '.', true).map_err(|e| args.error(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(HostPredicate { patterns }))
    }
}
