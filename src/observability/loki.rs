//! Loki log-shipping hook.
//!
//! # Responsibilities
//! - Filter records by level range
//! - Format records as JSON lines and attach stream labels
//! - Push batches to `<sink>/loki/api/v1/push` with basic auth
//!
//! # Design Decisions
//! - `emit` only enqueues onto a bounded channel; a background shipper task
//!   owns all network I/O so request handling never waits on the sink
//! - Transport failures stay inside the shipper: they are counted and logged
//!   locally, never returned to the caller
//! - Queued entries are grouped by label set so one push carries one stream
//!   per distinct `level`

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::config::ServiceConfig;
use crate::observability::logger::{Hook, HookError, Level, LevelRange, LogRecord};
use crate::observability::metrics;

/// Path of the Loki push endpoint, relative to the sink base URL.
pub const PUSH_PATH: &str = "/loki/api/v1/push";

/// Levels the service ships: info through fatal.
pub const SHIPPED_LEVELS: LevelRange = LevelRange::new(Level::Info, Level::Fatal);

/// Constant stream labels.
pub type Labels = BTreeMap<String, String>;

/// Overrides for the label a level is shipped under.
pub type LevelMap = HashMap<Level, String>;

/// Errors raised while talking to the sink.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("failed to build sink client: {0}")]
    Client(reqwest::Error),

    #[error("sink request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sink rejected push with status {0}")]
    Status(u16),
}

/// How a record becomes a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Formatter {
    #[default]
    Json,
}

impl Formatter {
    /// Render `record` as a single line, `level_label` being the mapped level.
    pub fn format(&self, record: &LogRecord, level_label: &str) -> Result<String, serde_json::Error> {
        match self {
            Formatter::Json => {
                let mut line = serde_json::Map::new();
                for (key, value) in &record.fields {
                    // Reserved keys are kept under a prefix rather than overwritten.
                    let key = match key.as_str() {
                        "level" | "msg" | "time" => format!("fields.{}", key),
                        _ => key.clone(),
                    };
                    line.insert(key, value.clone());
                }
                line.insert("level".to_string(), level_label.into());
                line.insert("msg".to_string(), record.message.clone().into());
                line.insert("time".to_string(), record.timestamp.to_rfc3339().into());
                serde_json::to_string(&line)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct BasicAuth {
    username: String,
    password: String,
}

/// Options for [`LokiHook`].
#[derive(Debug, Clone)]
pub struct LokiHookOptions {
    level_map: LevelMap,
    formatter: Formatter,
    static_labels: Labels,
    basic_auth: Option<BasicAuth>,
    timeout: Duration,
    queue_capacity: usize,
    batch_size: usize,
}

impl Default for LokiHookOptions {
    fn default() -> Self {
        Self {
            level_map: LevelMap::new(),
            formatter: Formatter::Json,
            static_labels: Labels::new(),
            basic_auth: None,
            timeout: Duration::from_secs(5),
            queue_capacity: 1024,
            batch_size: 100,
        }
    }
}

impl LokiHookOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level_map(mut self, level_map: LevelMap) -> Self {
        self.level_map = level_map;
        self
    }

    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_static_labels(mut self, labels: Labels) -> Self {
        self.static_labels = labels;
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Label a level is shipped under.
    pub fn level_label(&self, level: Level) -> &str {
        self.level_map
            .get(&level)
            .map(String::as_str)
            .unwrap_or(level.as_str())
    }

    /// Turn a record into a queued entry with its full label set.
    fn entry(&self, record: &LogRecord) -> Result<Entry, serde_json::Error> {
        let level_label = self.level_label(record.level);
        let line = self.formatter.format(record, level_label)?;

        let mut labels = self.static_labels.clone();
        labels.insert("level".to_string(), level_label.to_string());

        Ok(Entry {
            labels,
            timestamp_nanos: record.timestamp.timestamp_nanos_opt().unwrap_or_default(),
            line,
        })
    }
}

/// A formatted record waiting to be pushed.
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    labels: Labels,
    timestamp_nanos: i64,
    line: String,
}

#[derive(Debug)]
enum ShipMessage {
    Entry(Entry),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Serialize, PartialEq)]
struct PushRequest {
    streams: Vec<Stream>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Stream {
    stream: Labels,
    values: Vec<[String; 2]>,
}

fn build_push_request(entries: Vec<Entry>) -> PushRequest {
    let mut grouped: BTreeMap<Labels, Vec<[String; 2]>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.labels)
            .or_default()
            .push([entry.timestamp_nanos.to_string(), entry.line]);
    }

    PushRequest {
        streams: grouped
            .into_iter()
            .map(|(stream, values)| Stream { stream, values })
            .collect(),
    }
}

/// Delivery counters, readable while the shipper runs.
#[derive(Debug, Default)]
pub struct ShipperStats {
    pushed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl ShipperStats {
    /// Records delivered with a 2xx response.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Records lost to transport errors or non-2xx responses.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Records rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Hook shipping records to a Loki-compatible sink.
pub struct LokiHook {
    range: LevelRange,
    options: LokiHookOptions,
    tx: mpsc::Sender<ShipMessage>,
    stats: Arc<ShipperStats>,
}

impl LokiHook {
    /// Create the hook and spawn its shipper on the current Tokio runtime.
    ///
    /// `sink_url` is the sink base URL, e.g. `http://127.0.0.1:3100`.
    pub fn new(sink_url: &str, options: LokiHookOptions, range: LevelRange) -> Result<Self, ShipError> {
        // The sink is reached directly; environment proxies are ignored.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(options.timeout)
            .build()
            .map_err(ShipError::Client)?;

        let (tx, rx) = mpsc::channel(options.queue_capacity);
        let stats = Arc::new(ShipperStats::default());

        let shipper = Shipper {
            client,
            push_url: format!("{}{}", sink_url.trim_end_matches('/'), PUSH_PATH),
            basic_auth: options.basic_auth.clone(),
            batch_size: options.batch_size,
            stats: stats.clone(),
        };

        tracing::info!(
            push_url = %shipper.push_url,
            min_level = %range.min,
            max_level = %range.max,
            "Loki hook starting"
        );
        tokio::spawn(shipper.run(rx));

        Ok(Self {
            range,
            options,
            tx,
            stats,
        })
    }

    /// Build the hook the service runs with: `job` label, basic auth, and
    /// panic shipped as `critical` since Grafana has no panic level.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ShipError> {
        let options = LokiHookOptions::new()
            .with_level_map(LevelMap::from([(Level::Panic, "critical".to_string())]))
            .with_formatter(Formatter::Json)
            .with_static_labels(Labels::from([("job".to_string(), config.sink.job.clone())]))
            .with_basic_auth(&config.sink.username, &config.sink.password)
            .with_timeout(config.timeouts.sink_push())
            .with_queue_capacity(config.sink.queue_capacity)
            .with_batch_size(config.sink.batch_size);

        Self::new(&config.sink_url(), options, SHIPPED_LEVELS)
    }

    pub fn stats(&self) -> &ShipperStats {
        &self.stats
    }

    /// Wait until every record emitted before this call has been pushed or
    /// counted as failed.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ShipMessage::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

impl Hook for LokiHook {
    fn supports(&self, level: Level) -> bool {
        self.range.contains(level)
    }

    fn emit(&self, record: &LogRecord) -> Result<(), HookError> {
        let entry = self.options.entry(record)?;
        match self.tx.try_send(ShipMessage::Entry(entry)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_sink_dropped();
                Err(HookError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(HookError::Closed),
        }
    }
}

/// Background task draining the queue into sink pushes.
struct Shipper {
    client: reqwest::Client,
    push_url: String,
    basic_auth: Option<BasicAuth>,
    batch_size: usize,
    stats: Arc<ShipperStats>,
}

impl Shipper {
    async fn run(self, mut rx: mpsc::Receiver<ShipMessage>) {
        while let Some(first) = rx.recv().await {
            let mut batch = Vec::new();
            let mut waiters = Vec::new();
            let mut next = Some(first);

            while let Some(message) = next.take() {
                match message {
                    ShipMessage::Entry(entry) => batch.push(entry),
                    ShipMessage::Flush(ack) => waiters.push(ack),
                }
                if batch.len() < self.batch_size {
                    next = rx.try_recv().ok();
                }
            }

            if !batch.is_empty() {
                self.ship(batch).await;
            }
            for ack in waiters {
                let _ = ack.send(());
            }
        }

        tracing::debug!("Loki shipper stopped");
    }

    async fn ship(&self, batch: Vec<Entry>) {
        let count = batch.len() as u64;
        match self.push(build_push_request(batch)).await {
            Ok(()) => {
                self.stats.pushed.fetch_add(count, Ordering::Relaxed);
                metrics::record_sink_push(true, count);
            }
            Err(e) => {
                self.stats.failed.fetch_add(count, Ordering::Relaxed);
                metrics::record_sink_push(false, count);
                tracing::warn!(
                    push_url = %self.push_url,
                    records = count,
                    error = %e,
                    "Failed to push logs to sink"
                );
            }
        }
    }

    async fn push(&self, body: PushRequest) -> Result<(), ShipError> {
        let mut request = self.client.post(&self.push_url).json(&body);
        if let Some(auth) = &self.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ShipError::Status(status.as_u16()));
        }
        Ok(())
    }
}
