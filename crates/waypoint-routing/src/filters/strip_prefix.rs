use async_trait::async_trait;
use std::sync::Arc;
use waypoint_core::{Exchange, FilterChain, GatewayFilter, Result};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, FilterFactory};

/// `StripPrefix=2`: drop the first `parts` path segments
pub struct StripPrefixFilterFactory;

struct StripPrefixFilter {
    parts: usize,
}

fn strip_segments(path: &str, parts: usize) -> String {
    let remaining: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .skip(parts)
        .collect();
    if remaining.is_empty() {
        return "/".to_string();
    }
    let mut stripped = format!("/{}", remaining.join("/"));
    if path.ends_with('/') {
        stripped.push('/');
    }
    stripped
}

#[async_trait]
impl GatewayFilter for StripPrefixFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        exchange.add_original_request_url();
        let stripped = strip_segments(exchange.request.path(), self.parts);
        exchange.request.set_path(&stripped)?;
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "StripPrefix"
    }
}

impl FilterFactory for StripPrefixFilterFactory {
    fn name(&self) -> &str {
        "StripPrefix"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["parts"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let parts = args.parse::<usize>("parts")?.unwrap_or(1);
        Ok(Arc::new(StripPrefixFilter { parts }))
    }
}
