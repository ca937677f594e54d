//! Request logging middleware.
//!
//! # Responsibilities
//! - Time every request
//! - Capture request and response metadata into a [`RequestSnapshot`]
//! - Emit exactly one `info` record named `request` per request
//!
//! # Design Decisions
//! - Always logs at info, whatever the status
//! - A drop guard logs requests whose future is cancelled before completion,
//!   with status 0 and whatever metadata was known at the start
//! - The response is passed through untouched

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::observability::{metrics, Fields, Logger};

pub const REQUEST_MESSAGE: &str = "request";
pub const X_REQUEST_ID: &str = "x-request-id";
const CANCELLED: &str = "request cancelled";

/// Error text a handler attaches to its response for the request log.
///
/// The response itself is unaffected; only the logged `error` field changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything logged about a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    pub uri: String,
    pub method: String,
    pub status: u16,
    pub start_time: DateTime<Utc>,
    pub latency: Duration,
    pub protocol: String,
    pub host: String,
    pub user_agent: String,
    pub remote_ip: String,
    pub error: Option<String>,
    pub content_length: String,
    pub response_size: u64,
    pub uri_path: String,
    pub referer: String,
    pub request_id: String,
}

impl RequestSnapshot {
    /// Capture the request-side fields. Status, latency and response size are
    /// filled on completion.
    pub fn from_request(request: &Request, start_time: DateTime<Utc>) -> Self {
        let headers = request.headers();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            uri: request.uri().to_string(),
            method: request.method().to_string(),
            status: 0,
            start_time,
            latency: Duration::ZERO,
            protocol: format!("{:?}", request.version()),
            host: header_str(headers, header::HOST)
                .map(str::to_string)
                .or_else(|| request.uri().host().map(str::to_string))
                .unwrap_or_default(),
            user_agent: header_string(headers, header::USER_AGENT),
            remote_ip: remote_ip(headers, peer),
            error: None,
            content_length: header_string(headers, header::CONTENT_LENGTH),
            response_size: 0,
            uri_path: request.uri().path().to_string(),
            referer: header_string(headers, header::REFERER),
            request_id: header_string(headers, X_REQUEST_ID),
        }
    }

    /// Fill the response-side fields.
    pub fn complete(&mut self, response: &Response, latency: Duration) {
        let status = response.status();
        self.status = status.as_u16();
        self.latency = latency;
        self.response_size = response_size(response);
        self.error = match response.extensions().get::<HandlerError>() {
            Some(HandlerError(message)) => Some(message.clone()),
            None if status.is_client_error() || status.is_server_error() => Some(format!(
                "code={}, message={}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )),
            None => None,
        };
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        let mut put = |key: &str, value: serde_json::Value| {
            fields.insert(key.to_string(), value);
        };
        put("URI", self.uri.into());
        put("status", self.status.into());
        put("method", self.method.into());
        put("startTime", self.start_time.to_rfc3339().into());
        put("latency", (self.latency.as_nanos() as u64).into());
        put("latency_human", format!("{:?}", self.latency).into());
        put("protocol", self.protocol.into());
        put("host", self.host.into());
        put("userAgent", self.user_agent.into());
        put("remoteIP", self.remote_ip.into());
        put("error", self.error.map_or(serde_json::Value::Null, Into::into));
        put("ContentLength", self.content_length.into());
        put("responseSize", self.response_size.into());
        put("uriPath", self.uri_path.into());
        put("Referer", self.referer.into());
        put("requestID", self.request_id.into());
        fields
    }
}

/// Logs the snapshot exactly once: on completion, or on drop if the request
/// never completed.
struct PendingLog {
    logger: Arc<Logger>,
    started: Instant,
    snapshot: Option<RequestSnapshot>,
}

impl PendingLog {
    fn complete(&mut self, response: &Response) {
        if let Some(mut snapshot) = self.snapshot.take() {
            snapshot.complete(response, self.started.elapsed());
            emit(&self.logger, snapshot);
        }
    }
}

impl Drop for PendingLog {
    fn drop(&mut self) {
        if let Some(mut snapshot) = self.snapshot.take() {
            snapshot.latency = self.started.elapsed();
            snapshot.error = Some(CANCELLED.to_string());
            tracing::debug!(uri = %snapshot.uri, "Request dropped before completion");
            emit(&self.logger, snapshot);
        }
    }
}

fn emit(logger: &Logger, snapshot: RequestSnapshot) {
    metrics::record_request(&snapshot.method, snapshot.status, snapshot.latency);
    logger.info(REQUEST_MESSAGE, snapshot.into_fields());
}

/// Axum middleware: `middleware::from_fn_with_state(logger, request_log)`.
pub async fn request_log(
    State(logger): State<Arc<Logger>>,
    request: Request,
    next: Next,
) -> Response {
    let mut pending = PendingLog {
        logger,
        started: Instant::now(),
        snapshot: Some(RequestSnapshot::from_request(&request, Utc::now())),
    };

    let response = next.run(request).await;
    pending.complete(&response);
    response
}

fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_string(headers: &HeaderMap, name: impl header::AsHeaderName) -> String {
    header_str(headers, name).unwrap_or_default().to_string()
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
fn remote_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip").map(str::trim) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

fn response_size(response: &Response<Body>) -> u64 {
    response
        .body()
        .size_hint()
        .exact()
        .or_else(|| {
            header_str(response.headers(), header::CONTENT_LENGTH).and_then(|v| v.parse().ok())
        })
        .unwrap_or(0)
}
