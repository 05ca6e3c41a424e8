/// Request middleware and the client-origin extractor
use crate::metrics;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

/// Network origin of the caller, recorded on audit entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// First hop of the X-Forwarded-For header
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_for(&parts.headers) {
            return Ok(ClientIp(ip));
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(ClientIp(ip))
    }
}

/// Count and time every request
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    metrics::record_http_request(
        &method,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}
