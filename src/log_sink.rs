//! Injectable log sink for parser diagnostics.
//!
//! Parsers never touch global logging state directly. They are handed an
//! `Arc<dyn LogSink>` at construction and report through it, so a parse can
//! be observed in isolation (tests use `MemorySink`) and parses on separate
//! threads never share anything but the sink they were given.

use std::sync::{Arc, Mutex};

use log::Level;

/// Receives leveled messages with optional structured context.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]);
}

/// Default sink: forwards to the `log` facade under the `blox3d` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]) {
        if fields.is_empty() {
            log::log!(target: "blox3d", level, "{}", message);
        } else {
            let context: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
            log::log!(target: "blox3d", level, "{} [{}]", message, context.join(" "));
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _message: &str, _fields: &[(&str, &str)]) {}
}

/// A recorded log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the events recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events recorded at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]) {
        let entry = LogEntry {
            level,
            message: message.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// The sink used when the caller does not supply one.
pub fn default_sink() -> Arc<dyn LogSink> {
    Arc::new(LogCrateSink)
}
