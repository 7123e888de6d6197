//! The emitter: buffers log lines and ships them to the ingestion API.
//!
//! Writes are appended to an in-memory buffer. Once the buffer holds
//! `buffer_size` lines, the next write first flushes the buffer with a single
//! POST and then appends. There is no background task; the caller whose write
//! crosses the threshold awaits the request.
//!
//! Delivery is at-most-once. The buffer is emptied as soon as its lines are
//! captured for a request, so lines from a failed request are gone.

use std::sync::Arc;

use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::LineBuffer;
use crate::client::{HttpTransport, Transport, TransportError};
use crate::config::{ConfigError, EmitterConfig};
use crate::entry::{now_millis, LogEntry, Payload};

/// Errors returned by [`Emitter::emit`] and [`Emitter::close`].
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint answered with a status of 400 or above
    #[error(
        "API bad request ({status}): {}",
        .body.as_deref().unwrap_or("<unreadable response body>")
    )]
    Status {
        status: StatusCode,
        body: Option<String>,
    },
}

/// Buffered log line emitter.
///
/// `Emitter` is `Send + Sync`; share it between tasks with an `Arc`.
///
/// # Example
///
/// ```no_run
/// use log_emitter::{Emitter, EmitterConfig, LogEntry};
///
/// #[tokio::main]
/// async fn main() {
///     let config = EmitterConfig::new("billing", "my-api-key", "web-1");
///     let emitter = Emitter::new(config).expect("Invalid configuration");
///
///     emitter.write("service started").await;
///     emitter
///         .write_entry(LogEntry::new("payment declined").with_level("warn"))
///         .await;
///
///     if let Err(e) = emitter.close().await {
///         eprintln!("Failed to flush logs: {}", e);
///     }
/// }
/// ```
pub struct Emitter {
    config: EmitterConfig,
    buffer_size: usize,
    base_url: Url,
    buffer: LineBuffer,
    transport: Arc<dyn Transport>,
}

impl Emitter {
    /// Create an emitter that sends over HTTP.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required field is empty, the ingest URL
    /// is not a valid http(s) URL, or the HTTP client cannot be built.
    pub fn new(config: EmitterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(config.request_timeout)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::build(config, Arc::new(transport))
    }

    /// Create an emitter that sends through the given transport.
    pub fn with_transport(
        config: EmitterConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::build(config, transport)
    }

    // Expects a validated config.
    fn build(config: EmitterConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        let base_url = build_base_url(&config)?;
        let buffer_size = config.effective_buffer_size();

        debug!(
            app = %config.app,
            hostname = %config.hostname,
            buffer_size = buffer_size,
            endpoint = %config.ingest_url,
            "Emitter initialized"
        );

        Ok(Self {
            config,
            buffer_size,
            base_url,
            buffer: LineBuffer::with_capacity(buffer_size),
            transport,
        })
    }

    /// Write a plain text line.
    pub async fn write(&self, entry: impl Into<LogEntry>) {
        self.write_entry(entry.into()).await;
    }

    /// Write a log entry.
    ///
    /// If the buffer is already at the threshold it is emitted first. A
    /// failed emit is logged and does not prevent this entry from being
    /// buffered.
    pub async fn write_entry(&self, entry: LogEntry) {
        if self.buffer.len() >= self.buffer_size {
            if let Err(e) = self.emit().await {
                warn!(error = %e, "Emit log error");
            }
        }

        let line = entry.resolve(&self.config.app, now_millis());
        self.buffer.push(line);
    }

    /// Send every buffered line in one request.
    ///
    /// Does nothing when the buffer is empty. The buffer is cleared before
    /// the request is sent, whatever its outcome.
    pub async fn emit(&self) -> Result<(), EmitError> {
        let lines = self.buffer.take();
        if lines.is_empty() {
            return Ok(());
        }

        let payload = Payload::new(&lines);
        let body = serde_json::to_vec(&payload)?;
        let url = self.request_url(now_millis());

        debug!(lines = lines.len(), bytes = body.len(), "Emitting log lines");

        let response = self.transport.post_json(url, body).await?;
        if response.status.as_u16() < 400 {
            return Ok(());
        }

        let body = match response.body {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(error = %e, status = %response.status, "Read response body error");
                None
            }
        };

        Err(EmitError::Status {
            status: response.status,
            body,
        })
    }

    /// Flush any remaining lines. Call before dropping the emitter.
    pub async fn close(&self) -> Result<(), EmitError> {
        self.emit().await
    }

    fn request_url(&self, now: i64) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("now", &now.to_string());
        url
    }
}

fn build_base_url(config: &EmitterConfig) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        url: config.ingest_url.clone(),
        reason,
    };

    let mut url = Url::parse(&config.ingest_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    url.query_pairs_mut()
        .append_pair("apikey", &config.api_key)
        .append_pair("hostname", &config.hostname)
        .append_pair("mac", &config.mac)
        .append_pair("ip", &config.ip)
        .append_pair("tags", &config.tags.join(","));

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Line;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Reply {
        Status(u16, &'static str),
        UnreadableBody(u16),
        Fail,
    }

    struct RecordingTransport {
        reply: Reply,
        requests: Mutex<Vec<(Url, Value)>>,
    }

    impl RecordingTransport {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn sent_lines(&self) -> Vec<Line> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(_, body)| {
                    serde_json::from_value::<Vec<Line>>(body["lines"].clone()).unwrap()
                })
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn post_json(
            &self,
            url: Url,
            body: Vec<u8>,
        ) -> Result<crate::client::TransportResponse, TransportError> {
            let body: Value = serde_json::from_slice(&body).unwrap();
            self.requests.lock().unwrap().push((url, body));

            let (status, body) = match self.reply {
                Reply::Status(code, text) => (code, Ok(text.to_string())),
                Reply::UnreadableBody(code) => {
                    (code, Err(TransportError::Body("connection reset".to_string())))
                }
                Reply::Fail => {
                    return Err(TransportError::Request("connection refused".to_string()))
                }
            };

            Ok(crate::client::TransportResponse {
                status: StatusCode::from_u16(status).unwrap(),
                body,
            })
        }
    }

    fn test_config(buffer_size: usize) -> EmitterConfig {
        EmitterConfig {
            buffer_size,
            mac: "C0:FF:EE:C0:FF:EE".to_string(),
            ip: "10.0.1.101".to_string(),
            tags: vec!["prod".to_string(), "web".to_string()],
            ..EmitterConfig::new("logdna-go", "233", "LogDNA")
        }
    }

    fn create_emitter(buffer_size: usize, reply: Reply) -> (Emitter, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new(reply);
        let emitter = Emitter::with_transport(test_config(buffer_size), transport.clone())
            .expect("valid config");
        (emitter, transport)
    }

    #[test]
    fn test_new_rejects_missing_required_fields() {
        let err = Emitter::new(EmitterConfig::new("", "key", "host")).err().unwrap();
        assert!(matches!(err, ConfigError::AppRequired));

        let err = Emitter::new(EmitterConfig::new("app", "", "host")).err().unwrap();
        assert!(matches!(err, ConfigError::ApiKeyRequired));

        let err = Emitter::new(EmitterConfig::new("app", "key", "")).err().unwrap();
        assert!(matches!(err, ConfigError::HostnameRequired));
    }

    #[test]
    fn test_with_transport_rejects_missing_required_fields() {
        let transport = RecordingTransport::new(Reply::Status(200, ""));
        let err = Emitter::with_transport(EmitterConfig::new("app", "", "host"), transport.clone())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ApiKeyRequired));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_new_starts_empty_with_default_threshold() {
        let emitter = Emitter::new(EmitterConfig::new("app", "key", "host")).unwrap();
        assert_eq!(emitter.buffer.len(), 0);
        assert_eq!(emitter.buffer_size, crate::config::DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_new_rejects_malformed_endpoint() {
        let config = EmitterConfig {
            ingest_url: "not a url".to_string(),
            ..EmitterConfig::new("app", "key", "host")
        };
        assert!(matches!(
            Emitter::new(config),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let config = EmitterConfig {
            ingest_url: "ftp://logs.example.com/ingest".to_string(),
            ..EmitterConfig::new("app", "key", "host")
        };
        let err = Emitter::new(config).err().unwrap();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_request_url_carries_query() {
        let (emitter, _) = create_emitter(10, Reply::Status(200, ""));
        let url = emitter.request_url(1_700_000_000_000);

        assert!(url.as_str().starts_with("https://logs.logdna.com/logs/ingest?apikey=233"));
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["apikey"], "233");
        assert_eq!(query["hostname"], "LogDNA");
        assert_eq!(query["mac"], "C0:FF:EE:C0:FF:EE");
        assert_eq!(query["ip"], "10.0.1.101");
        assert_eq!(query["tags"], "prod,web");
        assert_eq!(query["now"], "1700000000000");
    }

    #[tokio::test]
    async fn test_writes_below_threshold_stay_buffered() {
        let (emitter, transport) = create_emitter(5, Reply::Status(200, ""));

        for i in 0..4 {
            emitter.write(format!("line {}", i)).await;
        }

        assert_eq!(emitter.buffer.len(), 4);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_write_at_threshold_emits_before_appending() {
        let (emitter, transport) = create_emitter(3, Reply::Status(200, ""));

        for i in 0..3 {
            emitter.write(format!("line {}", i)).await;
        }
        assert_eq!(emitter.buffer.len(), 3);
        assert_eq!(transport.request_count(), 0);

        emitter.write("line 3").await;

        assert_eq!(transport.request_count(), 1);
        assert_eq!(emitter.buffer.len(), 1);
        let sent: Vec<String> = transport.sent_lines().into_iter().map(|l| l.line).collect();
        assert_eq!(sent, vec!["line 0", "line 1", "line 2"]);
    }

    #[tokio::test]
    async fn test_emit_on_empty_buffer_is_noop() {
        let (emitter, transport) = create_emitter(3, Reply::Fail);

        assert!(emitter.emit().await.is_ok());
        assert!(emitter.close().await.is_ok());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_default_app_and_timestamp() {
        let (emitter, transport) = create_emitter(10, Reply::Status(200, ""));

        let before = now_millis();
        emitter.write("try to send log").await;
        emitter.write_entry(LogEntry::new("log body")).await;
        let after = now_millis();
        emitter
            .write_entry(LogEntry::new("explicit").with_app("worker").with_timestamp(42))
            .await;

        emitter.close().await.unwrap();
        let lines = transport.sent_lines();
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0].app, "logdna-go");
        assert_eq!(lines[1].app, "logdna-go");
        for line in &lines[..2] {
            assert!(line.timestamp >= before && line.timestamp <= after);
        }

        assert_eq!(lines[2].app, "worker");
        assert_eq!(lines[2].timestamp, 42);
    }

    #[tokio::test]
    async fn test_emit_body_shape() {
        let (emitter, transport) = create_emitter(10, Reply::Status(200, ""));

        emitter.write("only the text").await;
        emitter
            .write_entry(
                LogEntry::new("with extras")
                    .with_level("error")
                    .with_env("prod")
                    .with_meta(json!({"user": 7})),
            )
            .await;
        emitter.emit().await.unwrap();

        let requests = transport.requests.lock().unwrap();
        let (url, body) = &requests[0];
        assert!(url.query_pairs().any(|(k, _)| k == "now"));

        let first = body["lines"][0].as_object().unwrap();
        let keys: HashSet<&str> = first.keys().map(String::as_str).collect();
        assert_eq!(keys, HashSet::from(["timestamp", "line", "app"]));
        assert_eq!(first["line"], "only the text");

        let second = &body["lines"][1];
        assert_eq!(second["level"], "error");
        assert_eq!(second["env"], "prod");
        assert_eq!(second["meta"]["user"], 7);
    }

    #[tokio::test]
    async fn test_close_surfaces_transport_error_and_drops_lines() {
        let (emitter, transport) = create_emitter(10, Reply::Fail);

        emitter.write("first").await;
        emitter.write("second").await;

        let err = emitter.close().await.unwrap_err();
        assert!(matches!(err, EmitError::Transport(TransportError::Request(_))));
        assert_eq!(emitter.buffer.len(), 0);
        assert_eq!(transport.request_count(), 1);

        // Nothing was re-queued, so a second close has nothing to send.
        assert!(emitter.close().await.is_ok());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let (emitter, _) = create_emitter(10, Reply::Status(400, "invalid api key"));

        emitter.write("rejected").await;
        let err = emitter.emit().await.unwrap_err();

        match &err {
            EmitError::Status { status, body } => {
                assert_eq!(*status, StatusCode::BAD_REQUEST);
                assert_eq!(body.as_deref(), Some("invalid api key"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_keeps_status_error() {
        let (emitter, _) = create_emitter(10, Reply::UnreadableBody(503));

        emitter.write("rejected").await;
        let err = emitter.emit().await.unwrap_err();

        assert!(matches!(
            err,
            EmitError::Status { status, body: None } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(err.to_string().contains("unreadable"));
    }

    #[tokio::test]
    async fn test_success_status_below_400_is_ok() {
        let (emitter, _) = create_emitter(10, Reply::Status(302, "moved"));

        emitter.write("redirected").await;
        assert!(emitter.emit().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_auto_flush_does_not_block_write() {
        let (emitter, transport) = create_emitter(2, Reply::Status(500, "boom"));

        emitter.write("a").await;
        emitter.write("b").await;
        emitter.write("c").await;

        assert_eq!(transport.request_count(), 1);
        assert_eq!(emitter.buffer.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_are_all_counted() {
        let (emitter, transport) = create_emitter(10_000, Reply::Status(200, ""));
        let emitter = Arc::new(emitter);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let emitter = emitter.clone();
                tokio::spawn(async move {
                    for i in 0..100 {
                        emitter.write(format!("{}-{}", t, i)).await;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(emitter.buffer.len(), 800);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_deliver_each_line_once() {
        let (emitter, transport) = create_emitter(10, Reply::Status(200, ""));
        let emitter = Arc::new(emitter);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let emitter = emitter.clone();
                tokio::spawn(async move {
                    for i in 0..100 {
                        emitter.write(format!("{}-{}", t, i)).await;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        emitter.close().await.unwrap();

        let sent = transport.sent_lines();
        assert_eq!(sent.len(), 800);
        let unique: HashSet<String> = sent.into_iter().map(|l| l.line).collect();
        assert_eq!(unique.len(), 800);
        assert_eq!(emitter.buffer.len(), 0);
    }
}
