//! Diagnostics emitted while resolving and weaving
//!
//! By default diagnostics go to `tracing`. The `log` option of any
//! specification replaces the sink for that one resolve or weave call.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Resolution and installation details
    Debug,
    /// Noteworthy but expected events
    Info,
    /// Probable mistakes, such as an aspect matching nothing
    Warn,
}

/// A single diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub level: Level,
    /// Message text
    pub message: String,
}

/// Receiver of diagnostics
#[derive(Clone)]
pub struct DiagnosticSink(Arc<dyn Fn(&Diagnostic) + Send + Sync>);

impl DiagnosticSink {
    /// Sink calling `f` for every diagnostic
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Sink forwarding to `tracing`
    pub fn tracing() -> Self {
        Self::new(|d| match d.level {
            Level::Debug => tracing::debug!(target: "weft", "{}", d.message),
            Level::Info => tracing::info!(target: "weft", "{}", d.message),
            Level::Warn => tracing::warn!(target: "weft", "{}", d.message),
        })
    }

    /// Sink that records diagnostics in memory
    pub fn collecting() -> (Self, Arc<Mutex<Vec<Diagnostic>>>) {
        let store = Arc::new(Mutex::new(Vec::new()));
        let sink_store = Arc::clone(&store);
        let sink = Self::new(move |d| sink_store.lock().push(d.clone()));
        (sink, store)
    }

    /// Emit a diagnostic
    pub fn emit(&self, level: Level, message: impl Into<String>) {
        (self.0)(&Diagnostic {
            level,
            message: message.into(),
        });
    }

    /// Emit a debug diagnostic
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Level::Debug, message);
    }

    /// Emit a warning
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warn, message);
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiagnosticSink")
    }
}
