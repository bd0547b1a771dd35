//! Logging: tracing subscriber setup and the operator activity log
//!
//! Diagnostics go through `tracing`. Lines meant for the operator (call
//! progress, failures, device changes) are additionally recorded in the
//! [`ActivityLog`], a bounded newest-first list of timestamped entries that
//! is broadcast to UI subscribers as [`HubEvent::Log`].

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::error::{ClientError, ClientResult};
use crate::events::{EventEmitter, HubEvent};

/// Default number of activity entries kept
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log spans
    pub log_spans: bool,
    /// Application name to include in logs
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "voicehub".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Set up the global subscriber. `RUST_LOG` directives take precedence over
/// the configured level.
pub fn setup_logging(config: LoggingConfig) -> ClientResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .with_writer(std::io::stderr);

    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| ClientError::config(format!("logging already initialized: {}", e)))?;
    tracing::debug!(app = %config.app_name, "logging initialized");
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> ClientResult<Level> {
    Level::from_str(level).map_err(|_| ClientError::config(format!("Invalid log level: {}", level)))
}

/// One operator-facing activity line
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub line: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.timestamp.format("%H:%M:%S"), self.line)
    }
}

/// Bounded, newest-first operator log shared by all components
#[derive(Clone)]
pub struct ActivityLog {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
    events: EventEmitter,
}

impl ActivityLog {
    pub fn new(capacity: usize, events: EventEmitter) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
            events,
        }
    }

    /// Record a line and broadcast it
    pub fn push(&self, line: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            line: line.into(),
        };
        tracing::info!(target: "voicehub::activity", "{}", entry.line);

        {
            let mut entries = self.entries.lock();
            entries.push_front(entry.clone());
            entries.truncate(self.capacity);
        }
        self.events.emit(HubEvent::Log(entry));
    }

    /// Snapshot, newest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.line.clone()).collect()
    }

    /// True if any retained line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.line.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY, EventEmitter::default())
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let log = ActivityLog::new(3, EventEmitter::new(8));
        for i in 0..5 {
            log.push(format!("line {}", i));
        }
        assert_eq!(log.lines(), vec!["line 4", "line 3", "line 2"]);
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_push_broadcasts_entry() {
        let events = EventEmitter::new(8);
        let mut rx = events.subscribe_simple();
        let log = ActivityLog::new(10, events);

        log.push("Device ready");

        match rx.next().await {
            Some(HubEvent::Log(entry)) => assert_eq!(entry.line, "Device ready"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_entry_display_has_time_prefix() {
        let log = ActivityLog::default();
        log.push("Muted");
        let rendered = log.entries()[0].to_string();
        assert!(rendered.ends_with("  Muted"));
        assert_eq!(rendered.len(), "HH:MM:SS  Muted".len());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert!(parse_log_level("loud").is_err());
    }
}
