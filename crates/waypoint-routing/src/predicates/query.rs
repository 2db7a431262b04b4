use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use super::header::full_match_regex;
use crate::args::BoundArgs;
use crate::registry::{BuildContext, PredicateFactory};

/// `Query=color, gr.+`: query parameter present and, when a regex is given,
/// some value of it matches
pub struct QueryPredicateFactory;

struct QueryPredicate {
    param: String,
    regexp: Option<Regex>,
}

#[async_trait]
impl RoutePredicate for QueryPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        let Some(query) = exchange.request.query() else {
            return Ok(false);
        };
        let mut values = query.split('&').filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == self.param).then_some(value)
        });
        Ok(match &self.regexp {
            Some(regexp) => values.any(|value| regexp.is_match(value)),
            None => values.next().is_some(),
        })
    }
}

impl PredicateFactory for QueryPredicateFactory {
    fn name(&self) -> &str {
        "Query"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["param", "regexp"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let param = args.required("param")?.to_string();
        let regexp = args
            .optional("regexp")
            .map(|raw| full_match_regex(args, raw))
            .transpose()?;
        Ok(Arc::new(QueryPredicate { param, regexp }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FactoryRegistry;
    use waypoint_core::{ComponentSpec, GatewayRequest};

    async fn test_spec(spec: &str, uri: &'static str) -> bool {
        let registry = FactoryRegistry::with_builtins();
        let built = registry
            .build_predicate("r1", &spec.parse::<ComponentSpec>().unwrap())
            .unwrap();
        built
            .predicate
            .test(&Exchange::new(GatewayRequest::get(uri)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_param_presence() {
        assert!(test_spec("Query=debug", "/x?debug").await);
        assert!(test_spec("Query=debug", "/x?a=1&debug=true").await);
        assert!(!test_spec("Query=debug", "/x?a=1").await);
        assert!(!test_spec("Query=debug", "/x").await);
    }

    #[tokio::test]
    async fn test_query_param_regex_checks_every_value() {
        assert!(test_spec("Query=color, gr.+", "/x?color=red&color=green").await);
        assert!(!test_spec("Query=color, gr.+", "/x?color=red").await);
    }
}
