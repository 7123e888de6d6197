//! Log entry types.
//!
//! [`LogEntry`] is what callers hand to the emitter. Before it is buffered it
//! is resolved into a [`Line`], the immutable wire form, and lines are sent
//! wrapped in a [`Payload`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A log line as submitted by a caller.
///
/// Only `text` is required. Unset fields are filled in when the entry is
/// written: the timestamp with the current time and the app with the
/// emitter's configured default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    /// Log message content
    pub text: String,

    /// Milliseconds since the Unix epoch. `None` or `0` means "now".
    pub timestamp: Option<i64>,

    /// Originating application name
    pub app: Option<String>,

    /// Log severity level
    pub level: Option<String>,

    /// Deployment environment
    pub env: Option<String>,

    /// Free-form structured attachment
    pub meta: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new entry with only the message set.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Attach structured metadata to the entry.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Resolve defaults and produce the wire form of this entry.
    pub(crate) fn resolve(self, default_app: &str, now_millis: i64) -> Line {
        Line {
            timestamp: self.timestamp.filter(|ts| *ts != 0).unwrap_or(now_millis),
            line: self.text,
            app: non_empty(self.app).unwrap_or_else(|| default_app.to_string()),
            level: non_empty(self.level),
            env: non_empty(self.env),
            meta: self.meta.filter(|m| !m.is_null()),
        }
    }
}

impl From<&str> for LogEntry {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for LogEntry {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A resolved log line, exactly as it is sent to the ingestion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Log message content
    pub line: String,

    /// Originating application name
    pub app: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Request body for the ingestion API.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub lines: &'a [Line],
}

impl<'a> Payload<'a> {
    pub fn new(lines: &'a [Line]) -> Self {
        Self { lines }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
