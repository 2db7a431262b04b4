use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, PredicateFactory};

/// `Header=X-Tenant, acme-.*`: header present and, when a regex is given,
/// at least one value matches it entirely
pub struct HeaderPredicateFactory;

struct HeaderPredicate {
    header: http::HeaderName,
    regexp: Option<Regex>,
}

/// Compile `raw` anchored at both ends
pub(crate) fn full_match_regex(args: &BoundArgs, raw: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", raw))
        .map_err(|e| args.error(format!("invalid regexp '{}': {}", raw, e)))
}

#[async_trait]
impl RoutePredicate for HeaderPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        let mut values = exchange.request.headers.get_all(&self.header).iter().peekable();
        let Some(regexp) = &self.regexp else {
            return Ok(values.peek().is_some());
        };
        Ok(values
            .filter_map(|value| value.to_str().ok())
            .any(|value| regexp.is_match(value)))
    }
}

impl PredicateFactory for HeaderPredicateFactory {
    fn name(&self) -> &str {
        "Header"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["header", "regexp"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let name = args.required("header")?;
        let header = http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| args.error(format!("invalid header name '{}'", name)))?;
        let regexp = args
            .optional("regexp")
            .map(|raw| full_match_regex(args, raw))
            .transpose()?;
        Ok(Arc::new(HeaderPredicate { header, regexp }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FactoryRegistry;
    use waypoint_core::{ComponentSpec, GatewayRequest};

    async fn test_spec(spec: &str, request: GatewayRequest) -> bool {
        let registry = FactoryRegistry::with_builtins();
        let built = registry
            .build_predicate("r1", &spec.parse::<ComponentSpec>().unwrap())
            .unwrap();
        built.predicate.test(&Exchange::new(request)).await.unwrap()
    }

    #[tokio::test]
    async fn test_header_presence() {
        let request = GatewayRequest::get("/").with_header("x-tenant", "anything").unwrap();
        assert!(test_spec("Header=X-Tenant", request).await);
        assert!(!test_spec("Header=X-Tenant", GatewayRequest::get("/")).await);
    }

    #[tokio::test]
    async fn test_header_regex_must_match_whole_value() {
        let acme = GatewayRequest::get("/").with_header("x-tenant", "acme-eu").unwrap();
        let other = GatewayRequest::get("/").with_header("x-tenant", "not-acme-eu").unwrap();
        assert!(test_spec("Header=X-Tenant, acme-.*", acme).await);
        assert!(!test_spec("Header=X-Tenant, acme-.*", other).await);
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let registry = FactoryRegistry::with_builtins();
        let spec: ComponentSpec = "Header=X-Tenant, ([".parse().unwrap();
        let err = registry.build_predicate("r1", &spec).err().unwrap();
        assert_eq!(err.component_name(), Some("Header"));
    }
}
