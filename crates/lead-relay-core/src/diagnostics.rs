//! Diagnostic logging collaborator.
//!
//! Pipeline stages record noteworthy events (rejected signatures, skipped
//! leads, swallowed store failures) through [`DiagnosticLog`] with a short
//! message and a JSON context object. [`TracingDiagnosticLog`] forwards to
//! `tracing`; the JSON-lines file log lives in
//! [`crate::adapters::JsonLinesDiagnosticLog`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Sink for diagnostic records.
///
/// Implementations must never fail the caller; write errors are reported
/// through `tracing` and otherwise ignored.
#[async_trait]
pub trait DiagnosticLog: Send + Sync {
    /// Record a diagnostic message with structured context
    async fn log(&self, message: &str, context: Value);
}

/// Diagnostic log that emits each record as a `tracing` event.
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnosticLog;

impl TracingDiagnosticLog {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiagnosticLog for TracingDiagnosticLog {
    async fn log(&self, message: &str, context: Value) {
        info!(target: "lead_relay::diagnostics", context = %context, "{}", message);
    }
}

/// A recorded diagnostic entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRecord {
    pub message: String,
    pub context: Value,
}

/// Diagnostic log that keeps records in memory, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryDiagnosticLog {
    records: Arc<Mutex<Vec<DiagnosticRecord>>>,
}

impl MemoryDiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records logged so far
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Check whether any record carries `message`
    pub fn contains(&self, message: &str) -> bool {
        self.records().iter().any(|r| r.message == message)
    }
}

#[async_trait]
impl DiagnosticLog for MemoryDiagnosticLog {
    async fn log(&self, message: &str, context: Value) {
        if let Ok(mut records) = self.records.lock() {
            records.push(DiagnosticRecord {
                message: message.to_string(),
                context,
            });
        }
    }
}

#[cfg(test)]
#[path = "diagnostics_tests.rs"]
mod tests;
