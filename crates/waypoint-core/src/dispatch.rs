//! Dispatch trait definitions

use async_trait::async_trait;

use crate::{Result, exchange::Exchange};

/// Terminal proxy call: send `exchange.request` to `exchange.attributes.request_url`
/// and fill in `exchange.response`
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, exchange: &mut Exchange) -> Result<()>;
}

/// Entry point that routes an exchange end to end
#[async_trait]
pub trait ExchangeHandler: Send + Sync {
    /// Full pipeline for a fresh request
    async fn handle(&self, exchange: &mut Exchange) -> Result<()>;

    /// Internal re-dispatch of an exchange that was already admitted,
    /// used by fallbacks after the request URI has been rewritten
    async fn forward(&self, exchange: &mut Exchange) -> Result<()>;
}
