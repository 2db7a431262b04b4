use async_trait::async_trait;
use http::{HeaderName, HeaderValue};
use std::sync::Arc;
use waypoint_core::{Exchange, FilterChain, GatewayFilter, Result};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, FilterFactory};

fn header_pair(args: &BoundArgs) -> Result<(HeaderName, HeaderValue)> {
    let name = args.required("name")?;
    let value = args.optional("value").unwrap_or("");
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| args.error(format!("invalid header name '{}'", name)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| args.error(format!("invalid header value '{}'", value)))?;
    Ok((name, value))
}

/// `AddRequestHeader=X-Request-Source, gateway`
pub struct AddRequestHeaderFilterFactory;

struct AddRequestHeaderFilter {
    name: HeaderName,
    value: HeaderValue,
}

#[async_trait]
impl GatewayFilter for AddRequestHeaderFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        exchange
            .request
            .headers
            .append(self.name.clone(), self.value.clone());
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "AddRequestHeader"
    }
}

impl FilterFactory for AddRequestHeaderFilterFactory {
    fn name(&self) -> &str {
        "AddRequestHeader"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["name", "value"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let (name, value) = header_pair(args)?;
        Ok(Arc::new(AddRequestHeaderFilter { name, value }))
    }
}

/// `AddResponseHeader=X-Served-By, waypoint`; added once the inner chain
/// has produced the response
pub struct AddResponseHeaderFilterFactory;

struct AddResponseHeaderFilter {
    name: HeaderName,
    value: HeaderValue,
}

#[async_trait]
impl GatewayFilter for AddResponseHeaderFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        let result = chain.proceed(exchange).await;
        exchange
            .response
            .headers
            .append(self.name.clone(), self.value.clone());
        result
    }

    fn name(&self) -> &str {
        "AddResponseHeader"
    }
}

impl FilterFactory for AddResponseHeaderFilterFactory {
    fn name(&self) -> &str {
        "AddResponseHeader"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["name", "value"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let (name, value) = header_pair(args)?;
        Ok(Arc::new(AddResponseHeaderFilter { name, value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::{RecordingDispatch, run_filter};
    use waypoint_core::{ComponentSpec, GatewayRequest};

    #[tokio::test]
    async fn test_add_request_header_reaches_dispatch() {
        let dispatch = RecordingDispatch::ok();
        let spec: ComponentSpec = "AddRequestHeader=X-Source, gateway".parse().unwrap();
        let exchange = run_filter(&spec, GatewayRequest::get("/"), &dispatch)
            .await
            .unwrap();
        assert_eq!(exchange.request.headers["x-source"], "gateway");
        assert_eq!(dispatch.calls(), 1);
    }

    #[tokio::test]
    async fn test_add_response_header() {
        let dispatch = RecordingDispatch::ok();
        let spec: ComponentSpec = "AddResponseHeader=X-Served-By, waypoint".parse().unwrap();
        let exchange = run_filter(&spec, GatewayRequest::get("/"), &dispatch)
            .await
            .unwrap();
        assert_eq!(exchange.response.headers["x-served-by"], "waypoint");
    }

    #[test]
    fn test_invalid_header_name() {
        let registry = crate::registry::FactoryRegistry::with_builtins();
        let spec: ComponentSpec = "AddRequestHeader=bad header, x".parse().unwrap();
        assert!(registry.build_filter("r1", &spec).is_err());
    }
}
