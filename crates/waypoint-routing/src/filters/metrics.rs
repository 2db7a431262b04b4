use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use waypoint_core::{Exchange, FilterChain, GatewayFilter, Result};
use waypoint_observability::metrics::{GATEWAY_REQUESTS, MetricsSink};

use super::status::series_name;

/// Chain position of [`GatewayMetricsFilter`]; outermost but one
pub const GATEWAY_METRICS_FILTER_ORDER: i32 = i32::MIN + 1;

/// Global filter timing each request through the rest of the chain.
///
/// Tags: `outcome` (status series), `status`, `method`, `route_id` and
/// `route_uri`. Failed requests are tagged with the status their error maps to.
pub struct GatewayMetricsFilter {
    metrics: Arc<dyn MetricsSink>,
}

impl GatewayMetricsFilter {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl GatewayFilter for GatewayMetricsFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        let start = Instant::now();
        let result = chain.proceed(exchange).await;

        let status = match &result {
            Ok(()) => exchange.response.status,
            Err(error) => Some(error.status_code()),
        };
        let (route_id, route_uri) = exchange
            .attributes
            .route
            .as_deref()
            .map(|route| (route.id.clone(), route.uri.to_string()))
            .unwrap_or_default();

        self.metrics.record(
            GATEWAY_REQUESTS,
            start.elapsed(),
            &[
                ("outcome", status.map_or("CUSTOM", series_name).to_string()),
                ("status", status.map_or_else(|| "CUSTOM".to_string(), |s| s.as_u16().to_string())),
                ("method", exchange.request.method.to_string()),
                ("route_id", route_id),
                ("route_uri", route_uri),
            ],
        );
        result
    }

    fn name(&self) -> &str {
        "GatewayMetrics"
    }

    fn order(&self) -> Option<i32> {
        Some(GATEWAY_METRICS_FILTER_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::RecordingDispatch;
    use http::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;
    use waypoint_core::{GatewayRequest, OrderedFilter};

    #[derive(Default)]
    struct CapturingSink {
        records: Mutex<Vec<(String, Vec<(&'static str, String)>)>>,
    }

    impl MetricsSink for CapturingSink {
        fn record(&self, component: &str, _duration: Duration, tags: &[(&'static str, String)]) {
            self.records
                .lock()
                .unwrap()
                .push((component.to_string(), tags.to_vec()));
        }
    }

    fn tag<'a>(tags: &'a [(&'static str, String)], key: &str) -> &'a str {
        tags.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str()).unwrap()
    }

    async fn run(dispatch: &RecordingDispatch) -> (Result<()>, Arc<CapturingSink>) {
        let sink = Arc::new(CapturingSink::default());
        let filters = vec![OrderedFilter::new(
            GATEWAY_METRICS_FILTER_ORDER,
            Arc::new(GatewayMetricsFilter::new(sink.clone())),
        )];
        let mut exchange = Exchange::new(GatewayRequest::get("/orders"));
        let result = FilterChain::new(&filters, dispatch)
            .proceed(&mut exchange)
            .await;
        (result, sink)
    }

    #[tokio::test]
    async fn test_records_successful_request() {
        let (result, sink) = run(&RecordingDispatch::with_status(StatusCode::CREATED)).await;
        assert!(result.is_ok());

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, GATEWAY_REQUESTS);
        assert_eq!(tag(&records[0].1, "outcome"), "SUCCESSFUL");
        assert_eq!(tag(&records[0].1, "status"), "201");
        assert_eq!(tag(&records[0].1, "method"), "GET");
    }

    #[tokio::test]
    async fn test_records_failed_request_with_error_status() {
        let (result, sink) = run(&RecordingDispatch::failing("reset")).await;
        assert!(result.is_err());

        let records = sink.records.lock().unwrap();
        assert_eq!(tag(&records[0].1, "outcome"), "SERVER_ERROR");
        assert_eq!(tag(&records[0].1, "status"), "502");
    }
}
