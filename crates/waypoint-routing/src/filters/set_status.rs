use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;
use waypoint_core::{Exchange, FilterChain, GatewayFilter, Result};

use super::status::parse_status;
use crate::args::BoundArgs;
use crate::registry::{BuildContext, FilterFactory};

/// `SetStatus=401` or `SetStatus=UNAUTHORIZED`; overrides the status once
/// the inner chain completed successfully
pub struct SetStatusFilterFactory;

struct SetStatusFilter {
    status: StatusCode,
}

#[async_trait]
impl GatewayFilter for SetStatusFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        chain.proceed(exchange).await?;
        exchange.response.status = Some(self.status);
        Ok(())
    }

    fn name(&self) -> &str {
        "SetStatus"
    }
}

impl FilterFactory for SetStatusFilterFactory {
    fn name(&self) -> &str {
        "SetStatus"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["status"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>> {
        let status = parse_status(args.required("status")?).map_err(|e| args.error(e))?;
        Ok(Arc::new(SetStatusFilter { status }))
    }
}
