use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::trace;
use waypoint_core::{Exchange, FilterChain, GatewayFilter, Result};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, FilterFactory};

/// `RewritePath=/orders/(?<rest>.*), /${rest}`
///
/// Config files that treat `${...}` as a placeholder can write `$\{rest}`;
/// every `$\` in the replacement is read as `$`.
pub struct RewritePathFilterFactory;

struct RewritePathFilter {
    regexp: Regex,
    replacement: String,
}

/// Apply the `$\` escape to a configured replacement
pub fn unescape_replacement(raw: &str) -> String {
    raw.replace("$\\", "$")
}

#[async_trait]
impl GatewayFilter for RewritePathFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        exchange.add_original_request_url();

        let path = exchange.request.path().to_string();
        let rewritten = self.regexp.replace_all(&path, self.replacement.as_str());
        let rewritten = if rewritten.is_empty() { "/" } else { rewritten.as_ref() };
        trace!(from = %path, to = %rewritten, "Rewriting request path");
        exchange.request.set_path(rewritten)?;

        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "RewritePath"
    }
}

impl FilterFactory for RewritePathFilterFactory {
    fn name(&self) -> &str {
        "RewritePath"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["regexp", "replacement"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let raw = args.required("regexp")?;
        let regexp =
            Regex::new(raw).map_err(|e| args.error(format!("invalid regexp '{}': {}", raw, e)))?;
        let replacement = unescape_replacement(args.values().get("replacement").map_or("", String::as_str));
        Ok(Arc::new(RewritePathFilter {
            regexp,
            replacement,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::{RecordingDispatch, run_filter};
    use waypoint_core::{ComponentSpec, GatewayRequest};

    #[test]
    fn test_unescape_replacement() {
        assert_eq!(unescape_replacement("/$\\{rest}"), "/${rest}");
        assert_eq!(unescape_replacement("/${rest}"), "/${rest}");
    }

    #[tokio::test]
    async fn test_rewrite_named_group() {
        let dispatch = RecordingDispatch::ok();
        let spec: ComponentSpec = "RewritePath=/foo/(?<rest>.*), /${rest}".parse().unwrap();
        let exchange = run_filter(&spec, GatewayRequest::get("/foo/bar/baz?q=1"), &dispatch)
            .await
            .unwrap();

        assert_eq!(exchange.request.uri.to_string(), "/bar/baz?q=1");
        assert_eq!(exchange.attributes.original_request_urls.len(), 1);
        assert_eq!(dispatch.paths(), vec!["/bar/baz"]);
    }

    #[tokio::test]
    async fn test_rewrite_with_escaped_dollar() {
        let dispatch = RecordingDispatch::ok();
        let spec = ComponentSpec::new("RewritePath")
            .with_arg("regexp", "/foo/(?<rest>.*)")
            .with_arg("replacement", "/$\\{rest}");
        let exchange = run_filter(&spec, GatewayRequest::get("/foo/bar/baz"), &dispatch)
            .await
            .unwrap();

        assert_eq!(exchange.request.path(), "/bar/baz");
    }

    #[tokio::test]
    async fn test_rewrite_to_empty_becomes_root() {
        let dispatch = RecordingDispatch::ok();
        let spec: ComponentSpec = "RewritePath=/api/?".parse().unwrap();
        let exchange = run_filter(&spec, GatewayRequest::get("/api/"), &dispatch)
            .await
            .unwrap();
        assert_eq!(exchange.request.path(), "/");
    }
}
