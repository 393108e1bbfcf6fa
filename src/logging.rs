//! Audit log capture.
//!
//! Events logged with `target: AUDIT_TARGET` are kept in a small ring buffer
//! (shown by `/status`) and broadcast to a forwarder that posts them to the
//! configured log channel. Everything else only goes to stdout.

use futures::StreamExt;
use poise::serenity_prelude::ChannelId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{warn, Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::platform::{MessageContent, SharedPlatform};

/// Tracing target for lines that belong in the audit channel
pub const AUDIT_TARGET: &str = "audit";

/// A single audit entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: String,
    pub message: String,
}

impl LogEntry {
    /// Format as a string for display
    pub fn format(&self) -> String {
        format!(
            "{} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Buffer that stores recent audit entries and broadcasts new ones
pub struct LogBuffer {
    tx: broadcast::Sender<LogEntry>,
    /// Recent entries (ring buffer)
    recent: parking_lot::RwLock<Vec<LogEntry>>,
    max_entries: usize,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            recent: parking_lot::RwLock::new(Vec::with_capacity(max_entries)),
            max_entries,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= self.max_entries {
                recent.remove(0);
            }
            recent.push(entry.clone());
        }

        // No receivers until the forwarder is running
        let _ = self.tx.send(entry);
    }

    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        let recent = self.recent.read();
        let start = recent.len().saturating_sub(count);
        recent[start..].to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }
}

pub type SharedLogBuffer = Arc<LogBuffer>;

pub fn create_log_buffer(max_entries: usize) -> SharedLogBuffer {
    Arc::new(LogBuffer::new(max_entries))
}

/// Tracing layer that captures audit events into the buffer
pub struct LogCaptureLayer {
    buffer: SharedLogBuffer,
}

impl LogCaptureLayer {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != AUDIT_TARGET {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogEntry {
            timestamp: chrono::Utc::now(),
            level: event.metadata().level().to_string(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else if self.message.is_empty() {
            self.message = format!("{}={}", field.name(), value);
        }
    }
}

/// Post every new audit entry to the log channel. Failures are logged to
/// stdout only, never back into the audit stream.
pub fn spawn_audit_forwarder(
    buffer: SharedLogBuffer,
    platform: SharedPlatform,
    log_channel: ChannelId,
) -> JoinHandle<()> {
    let mut stream = BroadcastStream::new(buffer.subscribe());
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(entry) => {
                    let content = MessageContent::text(entry.message);
                    if let Err(e) = platform.send_message(log_channel, &content).await {
                        warn!("Failed to post audit line to {}: {}", log_channel, e);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Audit forwarder lagged, dropped {} lines", skipped);
                }
            }
        }
    })
}
