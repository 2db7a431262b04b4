use async_trait::async_trait;
use http::Uri;
use http::uri::PathAndQuery;
use tracing::trace;
use waypoint_core::{Exchange, FilterChain, GatewayError, GatewayFilter, Result};

/// Chain position of [`RouteToRequestUrlFilter`]
pub const ROUTE_TO_URL_FILTER_ORDER: i32 = 10000;

/// Global filter composing the target URL from the matched route's scheme
/// and authority and the current request path and query.
///
/// Runs after the path rewriting route filters. The URL is recomputed on
/// every pass so that a forwarded fallback targets the fallback route.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteToRequestUrlFilter;

/// `route_uri` scheme and authority joined with `request` path and query
pub fn compose_request_url(route_uri: &Uri, request: &Uri) -> Result<Uri> {
    let mut parts = route_uri.clone().into_parts();
    parts.path_and_query = Some(
        request
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/")),
    );
    Uri::from_parts(parts).map_err(|e| {
        GatewayError::Internal(format!(
            "unable to compose request url from '{}' and '{}': {}",
            route_uri, request, e
        ))
    })
}

#[async_trait]
impl GatewayFilter for RouteToRequestUrlFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> Result<()> {
        if let Some(route) = exchange.attributes.route.clone() {
            let url = compose_request_url(&route.uri, &exchange.request.uri)?;
            trace!(route_id = %route.id, url = %url, "Composed request url");
            exchange.attributes.request_url = Some(url);
        }
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "RouteToRequestUrl"
    }

    fn order(&self) -> Option<i32> {
        Some(ROUTE_TO_URL_FILTER_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_keeps_route_authority_and_request_path() {
        let url = compose_request_url(
            &Uri::from_static("http://orders:8080/ignored"),
            &Uri::from_static("/api/orders?page=2"),
        )
        .unwrap();
        assert_eq!(url.to_string(), "http://orders:8080/api/orders?page=2");
    }

    #[test]
    fn test_compose_with_load_balanced_scheme() {
        let url = compose_request_url(
            &Uri::from_static("lb://orders-service"),
            &Uri::from_static("/fallback"),
        )
        .unwrap();
        assert_eq!(url.scheme_str(), Some("lb"));
        assert_eq!(url.path(), "/fallback");
    }
}
