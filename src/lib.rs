//! Log Emitter Library
//!
//! Buffers log lines in memory and ships them to a log ingestion HTTP API:
//!
//! - **config**: Emitter configuration, validation and environment loading
//! - **entry**: Caller-facing log entries and their resolved wire form
//! - **buffer**: Mutex-guarded line buffer with atomic take
//! - **client**: HTTP transport used to deliver payloads
//! - **emitter**: Threshold-triggered buffering and emission
//!
//! # Example
//!
//! ```no_run
//! use log_emitter::config::EmitterConfig;
//! use log_emitter::emitter::Emitter;
//! use log_emitter::entry::LogEntry;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Load configuration from environment
//!     let config = EmitterConfig::from_env().expect("Failed to load config");
//!
//!     // Validate it and build the emitter
//!     let emitter = Emitter::new(config).expect("Invalid configuration");
//!
//!     // Buffer some lines
//!     emitter.write("worker started").await;
//!     emitter
//!         .write_entry(
//!             LogEntry::new("job finished")
//!                 .with_level("info")
//!                 .with_meta(json!({"job_id": 42})),
//!         )
//!         .await;
//!
//!     // Send whatever is left before exiting
//!     emitter.close().await.ok();
//! }
//! ```

// Module declarations
pub mod buffer;
pub mod client;
pub mod config;
pub mod emitter;
pub mod entry;

// Re-export commonly used types at crate root for convenience
pub use client::{HttpTransport, Transport, TransportError, TransportResponse};
pub use config::{ConfigError, EmitterConfig, DEFAULT_BUFFER_SIZE, DEFAULT_INGEST_URL};
pub use emitter::{EmitError, Emitter};
pub use entry::{Line, LogEntry};
