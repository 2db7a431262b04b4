use async_trait::async_trait;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use super::pattern::AntPattern;
use crate::args::{BoundArgs, ShortcutType};
use crate::registry::{BuildContext, PredicateFactory};

/// `Path=/orders/**,/carts/{id}`: request path matches any pattern
///
/// `matchTrailingSlash` (default `true`) also accepts the path with one
/// trailing slash appended.
pub struct PathPredicateFactory;

struct PathPredicate {
    patterns: Vec<AntPattern>,
    match_trailing_slash: bool,
}

#[async_trait]
impl RoutePredicate for PathPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        let path = exchange.request.path();
        let trimmed = match path.strip_suffix('/') {
            Some(rest) if self.match_trailing_slash && !rest.is_empty() => Some(rest),
            _ => None,
        };
        Ok(self.patterns.iter().any(|pattern| {
            pattern.matches(path) || trimmed.is_some_and(|rest| pattern.matches(rest))
        }))
    }
}

impl PredicateFactory for PathPredicateFactory {
    fn name(&self) -> &str {
        "Path"
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
                AntPattern::compile(pattern, '/', false).map_err(|e| args.error(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let match_trailing_slash = match args.optional("matchTrailingSlash") {
            Some(_) => args.flag("matchTrailingSlash")?,
            None => true,
        };

        Ok(Arc::new(PathPredicate {
            patterns,
            match_trailing_slash,
        }))
    }
}
