//! In-memory run log that the user can export as a text file.
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use log::Level;
use serde_json::Value;

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub detail: Option<Value>,
}

/// Bounded ring of log entries. The oldest entry is dropped once the
/// capacity is reached. Every recorded entry is mirrored to the `log` facade.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    enabled: AtomicBool,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn record(&self, level: Level, message: impl Into<String>, detail: Option<Value>) {
        if !self.is_enabled() {
            return;
        }
        let message = message.into();
        match level {
            Level::Error => engine_error!("{message}"),
            Level::Warn => engine_warn!("{message}"),
            Level::Info => engine_info!("{message}"),
            Level::Debug | Level::Trace => engine_debug!("{message}"),
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
            detail,
        });
    }

    pub fn info(&self, message: impl Into<String>, detail: Option<Value>) {
        self.record(Level::Info, message, detail);
    }

    pub fn warn(&self, message: impl Into<String>, detail: Option<Value>) {
        self.record(Level::Warn, message, detail);
    }

    pub fn error(&self, message: impl Into<String>, detail: Option<Value>) {
        self.record(Level::Error, message, detail);
    }

    pub fn debug(&self, message: impl Into<String>, detail: Option<Value>) {
        self.record(Level::Debug, message, detail);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// One block per entry: `[timestamp] [LEVEL] message`, then the detail
    /// as pretty JSON when present. Blocks are separated by newlines.
    pub fn export_text(&self) -> String {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(
                out,
                "[{}] [{}] {}",
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.level,
                entry.message
            );
            if let Some(detail) = &entry.detail {
                let pretty = serde_json::to_string_pretty(detail).unwrap_or_default();
                let _ = write!(out, "\n{pretty}");
            }
        }
        out
    }

    pub fn export_filename(now: DateTime<Utc>) -> String {
        format!(
            "novelbin-aggregator-logs-{}.txt",
            now.format("%Y-%m-%dT%H-%M-%S")
        )
    }
}
