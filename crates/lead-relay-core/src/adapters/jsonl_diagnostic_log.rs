//! # JSON Lines Diagnostic Log
//!
//! Appends diagnostic records to a file, one JSON object per line:
//! `{"timestamp": "...", "message": "...", "context": {...}}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::diagnostics::DiagnosticLog;
use crate::Timestamp;

/// File-backed diagnostic log.
///
/// Disabled logs accept records and drop them, which lets the service wire
/// the log unconditionally and toggle it from settings.
#[derive(Debug)]
pub struct JsonLinesDiagnosticLog {
    path: PathBuf,
    enabled: bool,
    write_lock: Mutex<()>,
}

impl JsonLinesDiagnosticLog {
    pub fn new(path: PathBuf, enabled: bool) -> Self {
        Self {
            path,
            enabled,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[async_trait]
impl DiagnosticLog for JsonLinesDiagnosticLog {
    async fn log(&self, message: &str, context: Value) {
        if !self.enabled {
            return;
        }

        let record = json!({
            "timestamp": Timestamp::now().to_rfc3339(),
            "message": message,
            "context": context,
        });

        if let Err(e) = self.append(&record.to_string()).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write diagnostic record");
        }
    }
}

#[cfg(test)]
#[path = "jsonl_diagnostic_log_tests.rs"]
mod tests;
