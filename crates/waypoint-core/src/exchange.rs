//! Per-request exchange
//!
//! An [`Exchange`] bundles the inbound request, the response under
//! construction and the request-scoped attributes the routing pipeline
//! communicates through (matched route, target URL, weight selections,
//! breaker error). It is created at pipeline entry and dropped on completion.

use bytes::Bytes;
use http::uri::{PathAndQuery, Uri};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::route::Route;

/// Inbound request as seen by predicates and filters
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            remote_addr: None,
            body: Bytes::new(),
        }
    }

    /// Request for a URI received at runtime
    pub fn parse(method: Method, uri: &str) -> Result<Self> {
        let uri = uri
            .parse::<Uri>()
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid uri '{}': {}", uri, e)))?;
        Ok(Self::new(method, uri))
    }

    /// GET request for a URI literal
    ///
    /// # Panics
    /// If `uri` is not a valid URI. Use [`GatewayRequest::parse`] for
    /// anything not known at compile time.
    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri))
    }

    /// Append a header, rejecting names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name = HeaderName::try_from(name).map_err(|e| {
            GatewayError::InvalidRequest(format!("invalid header name '{}': {}", name, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            GatewayError::InvalidRequest(format!("invalid value for header '{}': {}", name, e))
        })?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Raw request path (`/` when the URI carries none)
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Host from the `Host` header, falling back to the URI authority
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| self.uri.host())
    }

    /// Value of the first query parameter named `name`
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    /// Replace path and query, keeping scheme and authority
    pub fn set_path_and_query(&mut self, path: &str, query: Option<&str>) -> Result<()> {
        let path_and_query = match query {
            Some(query) if !query.is_empty() => format!("{}?{}", path, query),
            _ => path.to_string(),
        };
        let path_and_query = PathAndQuery::try_from(path_and_query.as_str()).map_err(|e| {
            GatewayError::Internal(format!("invalid path '{}': {}", path_and_query, e))
        })?;

        let mut parts = self.uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        self.uri = Uri::from_parts(parts)
            .map_err(|e| GatewayError::Internal(format!("invalid request uri: {}", e)))?;
        Ok(())
    }

    /// Replace the path, keeping the current query string
    pub fn set_path(&mut self, path: &str) -> Result<()> {
        let query = self.query().map(str::to_string);
        self.set_path_and_query(path, query.as_deref())
    }
}

/// Response under construction; `status` stays `None` until something sets it
#[derive(Debug, Clone, Default)]
pub struct GatewayResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Request-scoped attributes shared between pipeline stages
#[derive(Debug, Clone, Default)]
pub struct ExchangeAttributes {
    /// Route selected by the handler mapping
    pub route: Option<Arc<Route>>,
    /// Id of the route whose predicate is currently under test
    pub predicate_route_id: Option<String>,
    /// Fully composed URL the terminal dispatch will call
    pub request_url: Option<Uri>,
    /// Request URIs before rewrites, oldest first
    pub original_request_urls: Vec<Uri>,
    /// Weight group name → selected route id for this request
    pub weights: HashMap<String, String>,
    /// Error that triggered a circuit breaker fallback
    pub circuit_breaker_error: Option<GatewayError>,
    /// Set once the terminal dispatch has been invoked
    pub already_routed: bool,
}

/// Request, response and attributes for one pass through the gateway
#[derive(Debug, Clone)]
pub struct Exchange {
    pub id: Uuid,
    pub request: GatewayRequest,
    pub response: GatewayResponse,
    pub attributes: ExchangeAttributes,
}

impl Exchange {
    pub fn new(request: GatewayRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            response: GatewayResponse::default(),
            attributes: ExchangeAttributes::default(),
        }
    }

    /// Id of the matched route, if any
    pub fn route_id(&self) -> Option<&str> {
        self.attributes.route.as_deref().map(|route| route.id.as_str())
    }

    /// Remember the current request URI before a filter rewrites it
    pub fn add_original_request_url(&mut self) {
        let uri = self.request.uri.clone();
        if !self.attributes.original_request_urls.contains(&uri) {
            self.attributes.original_request_urls.push(uri);
        }
    }

    /// Clear routing state so the exchange can be routed again
    pub fn reset_routing(&mut self) {
        self.attributes.route = None;
        self.attributes.predicate_route_id = None;
        self.attributes.request_url = None;
        self.attributes.already_routed = false;
    }
}
