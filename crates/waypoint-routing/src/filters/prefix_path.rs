use async_trait::async_trait;
use std::sync::Arc;
use waypoint_core::{Exchange, FilterChain, GatewayFilter, Result};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, FilterFactory};

/// `PrefixPath=/v2`
pub struct PrefixPathFilterFactory;

struct PrefixPathFilter {
    prefix: String,
}

#[async_trait]
impl GatewayFilter for PrefixPathFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        if !exchange.attributes.already_routed {
            exchange.add_original_request_url();
            let prefixed = format!("{}{}", self.prefix, exchange.request.path());
            exchange.request.set_path(&prefixed)?;
        }
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "PrefixPath"
    }
}

impl FilterFactory for PrefixPathFilterFactory {
    fn name(&self) -> &str {
        "PrefixPath"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["prefix"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let prefix = args.required("prefix")?.trim_end_matches('/');
        if !prefix.starts_with('/') {
            return Err(args.error(format!("prefix '{}' must start with '/'", prefix)));
        }
        Ok(Arc::new(PrefixPathFilter {
            prefix: prefix.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::{RecordingDispatch, run_filter};
    use waypoint_core::{ComponentSpec, GatewayRequest};

    #[tokio::test]
    async fn test_prefix_path() {
        let dispatch = RecordingDispatch::ok();
        let spec: ComponentSpec = "PrefixPath=/v2/".parse().unwrap();
        let exchange = run_filter(&spec, GatewayRequest::get("/orders?x=1"), &dispatch)
            .await
            .unwrap();
        assert_eq!(exchange.request.uri.to_string(), "/v2/orders?x=1");
    }

    #[test]
    fn test_relative_prefix_is_rejected() {
        let registry = crate::registry::FactoryRegistry::with_builtins();
        let spec: ComponentSpec = "PrefixPath=v2".parse().unwrap();
        assert!(registry.build_filter("r1", &spec).is_err());
    }
}
