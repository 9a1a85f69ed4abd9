//! Real-time log streaming via Server-Sent Events (SSE).
//!
//! Log entries are emitted as `tracing` events and broadcast to every
//! subscribed SSE client.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffered entries per subscriber before slow clients start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Log level shown to SSE clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Session the entry belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Uuid>,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            session: None,
            indent: 0,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_session(mut self, session: Uuid) -> Self {
        self.session = Some(session);
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Emit a tracing event and send the entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let session = entry.session.map(|s| s.to_string()).unwrap_or_default();
        match entry.level {
            LogLevel::Info => tracing::info!(session = %session, "{}", entry.message),
            LogLevel::Success => tracing::info!(session = %session, outcome = "success", "{}", entry.message),
            LogLevel::Warning => tracing::warn!(session = %session, "{}", entry.message),
            LogLevel::Error => tracing::error!(session = %session, "{}", entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_camel_case() {
        let id = Uuid::new_v4();
        let entry = LogEntry::success("Loaded").with_session(id).with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "success");
        assert_eq!(json["session"], id.to_string());
        assert_eq!(json["indent"], 1);
    }

    #[test]
    fn test_entry_without_session_omits_field() {
        let json = serde_json::to_value(LogEntry::info("x")).unwrap();
        assert!(json.get("session").is_none());
    }

    #[tokio::test]
    async fn test_global_helpers_broadcast() {
        let mut rx = LOG_BROADCASTER.subscribe();
        log_warning("disk almost full");
        log_error("disk full");

        let mut seen = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(entry) => seen.push((entry.level, entry.message)),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(seen.contains(&(LogLevel::Warning, "disk almost full".to_string())));
        assert!(seen.contains(&(LogLevel::Error, "disk full".to_string())));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::warning("careful"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, LogLevel::Warning);
        assert_eq!(received.message, "careful");
    }
}
