//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use loki_request_logger::observability::{Hook, HookError, Level, LogRecord, Logger};
use loki_request_logger::{HttpServer, ServiceConfig, Shutdown};

/// Hook that keeps every record it is given.
#[derive(Default)]
pub struct RecordingHook {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingHook {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn matching(&self, level: Level, message: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level && r.message == message)
            .collect()
    }
}

impl Hook for RecordingHook {
    fn supports(&self, _level: Level) -> bool {
        true
    }

    fn emit(&self, record: &LogRecord) -> Result<(), HookError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Logger wired to a fresh [`RecordingHook`].
pub fn recording_logger() -> (Arc<Logger>, Arc<RecordingHook>) {
    let hook = Arc::new(RecordingHook::default());
    let logger = Arc::new(Logger::builder().hook(hook.clone()).build());
    (logger, hook)
}

/// A running service on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

pub async fn start_server(logger: Arc<Logger>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(ServiceConfig::default(), logger);
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// One push received by the mock sink.
#[derive(Debug, Clone)]
pub struct CapturedPush {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

/// Records captured by a mock Loki sink.
#[derive(Clone, Default)]
pub struct SinkCapture {
    pushes: Arc<Mutex<Vec<CapturedPush>>>,
}

impl SinkCapture {
    pub fn pushes(&self) -> Vec<CapturedPush> {
        self.pushes.lock().unwrap().clone()
    }

    /// Every shipped entry as `(stream labels, parsed line)`.
    pub fn entries(&self) -> Vec<(serde_json::Value, serde_json::Value)> {
        let mut entries = Vec::new();
        for push in self.pushes() {
            for stream in push.body["streams"].as_array().cloned().unwrap_or_default() {
                for value in stream["values"].as_array().cloned().unwrap_or_default() {
                    let line = serde_json::from_str(value[1].as_str().unwrap()).unwrap();
                    entries.push((stream["stream"].clone(), line));
                }
            }
        }
        entries
    }
}

#[derive(Clone)]
struct SinkState {
    capture: SinkCapture,
    status: StatusCode,
}

async fn push_handler(
    State(state): State<SinkState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .capture
        .pushes
        .lock()
        .unwrap()
        .push(CapturedPush { authorization, body });
    state.status
}

/// Start a mock Loki sink answering every push with `status`.
pub async fn start_mock_sink(status: StatusCode) -> (SocketAddr, SinkCapture) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let capture = SinkCapture::default();

    let app = Router::new()
        .route("/loki/api/v1/push", post(push_handler))
        .with_state(SinkState {
            capture: capture.clone(),
            status,
        });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, capture)
}

/// Config whose sink points at `addr`.
pub fn config_for_sink(addr: SocketAddr) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.sink.host = addr.ip().to_string();
    config.sink.port = addr.port().to_string();
    config.timeouts.sink_push_secs = 2;
    config
}
