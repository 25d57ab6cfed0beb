//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Capture the client request so it can be replayed on retry
//! - Build the upstream request for a given target
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Bodies are buffered once; each attempt gets a cheap clone
//! - Hop-by-hop headers are not forwarded upstream

use std::fmt;
use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        request::Parts,
        uri::{Authority, PathAndQuery},
        Method, Uri,
    },
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Correlation ID attached to every proxied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access to the request ID stored in request extensions.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Middleware that ensures every request carries an `X-Request-ID`.
///
/// The ID is echoed on the response unless the backend already set one.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| RequestId(v.to_string()))
        .unwrap_or_default();

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        request.headers_mut().insert(X_REQUEST_ID, value.clone());
        request.extensions_mut().insert(id);

        let mut response = next.run(request).await;
        response.headers_mut().entry(X_REQUEST_ID).or_insert(value);
        response
    } else {
        next.run(request).await
    }
}

/// A client request captured for (possibly repeated) forwarding.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub path_and_query: PathAndQuery,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: String,
}

impl ForwardRequest {
    pub fn new(parts: Parts, body: Bytes, peer: SocketAddr, request_id: String) -> Self {
        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let mut headers = parts.headers;
        for name in HOP_BY_HOP {
            headers.remove(name);
        }
        append_forwarded_for(&mut headers, peer);

        Self {
            method: parts.method,
            path_and_query,
            headers,
            body,
            request_id,
        }
    }

    /// Build the request sent to `authority` for one attempt.
    ///
    /// The URI is in origin form since the request goes over a direct
    /// connection; the client's `Host` is kept, `authority` fills in when absent.
    pub fn to_upstream(&self, authority: &Authority) -> Result<axum::http::Request<Body>, axum::http::Error> {
        let uri = Uri::from(self.path_and_query.clone());

        let mut builder = axum::http::Request::builder().method(self.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
            if !headers.contains_key(header::HOST) {
                if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                    headers.insert(header::HOST, host);
                }
            }
        }
        builder.body(Body::from(self.body.clone()))
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, ip),
        _ => ip.clone(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.insert(X_REAL_IP, value);
    }
}
