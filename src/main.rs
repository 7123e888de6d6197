//! Log Emitter - ships stdin lines to a log ingestion API
//!
//! Every line read from standard input is written to an [`Emitter`], which
//! buffers lines and posts them in batches. On EOF or Ctrl+C the remaining
//! lines are flushed before the process exits.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `LOG_EMITTER_APP`: Application name (required)
//! - `LOG_EMITTER_API_KEY`: Ingestion key (required)
//! - `LOG_EMITTER_HOSTNAME`: Host identifier (required)
//! - `LOG_EMITTER_MAC`, `LOG_EMITTER_IP`: Host addresses (optional)
//! - `LOG_EMITTER_TAGS`: Comma separated tags (optional)
//! - `LOG_EMITTER_BUFFER_SIZE`: Lines per batch (default: 100)
//! - `LOG_EMITTER_INGEST_URL`: Ingestion endpoint
//! - `LOG_EMITTER_REQUEST_TIMEOUT_SECS`: HTTP request timeout (optional)
//! - `LOG_EMITTER_LEVEL`: Level attached to every line (optional)
//! - `RUST_LOG`: Logging level filter (default: info)

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use log_emitter::config::EmitterConfig;
use log_emitter::emitter::Emitter;
use log_emitter::entry::LogEntry;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    let config = match EmitterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        app = %config.app,
        hostname = %config.hostname,
        ingest_url = %config.ingest_url,
        buffer_size = config.effective_buffer_size(),
        "Configuration loaded"
    );

    let emitter = match Emitter::new(config) {
        Ok(emitter) => emitter,
        Err(e) => {
            error!(error = %e, "Failed to create emitter");
            std::process::exit(1);
        }
    };

    let level = std::env::var("LOG_EMITTER_LEVEL").ok();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forwarded: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        let mut entry = LogEntry::new(text);
                        entry.level = level.clone();
                        emitter.write_entry(entry).await;
                        forwarded += 1;
                    }
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping...");
                break;
            }
        }
    }

    match emitter.close().await {
        Ok(()) => info!(lines = forwarded, "Log Emitter stopped"),
        Err(e) => {
            error!(error = %e, "Failed to flush remaining lines");
            std::process::exit(1);
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Output goes to stderr so it never mixes with piped input.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}
