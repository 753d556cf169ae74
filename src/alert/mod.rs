//! Alert dispatch
//!
//! Alerts from both detectors converge on a single sink. Sinks are
//! fire-and-forget: a failing sink logs and drops, it never stalls the
//! pipeline.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::core::Alert;

/// Where alerts go. Implementations must be thread safe; the alert worker
/// owns the sink but tests share it across threads.
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: Alert);
}

/// Settings for alert delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Append alerts as JSON lines to this file
    pub jsonl_path: Option<PathBuf>,
}

/// Logs each alert through `tracing` at warn level
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn emit(&self, alert: Alert) {
        warn!(
            alert_id = %alert.id,
            kind = %alert.alert_type,
            confidence = alert.confidence,
            "{}",
            alert.description
        );
    }
}

/// Appends one JSON object per alert to a file
pub struct JsonlSink {
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating alert directory {parent:?}"))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening alert file {path:?}"))?;
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }
}

impl AlertSink for JsonlSink {
    fn emit(&self, alert: Alert) {
        let line = match serde_json::to_string(&alert) {
            Ok(l) => l,
            Err(e) => {
                error!("Unable to serialize alert {}: {e}", alert.id);
                return;
            }
        };
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{line}") {
            error!("Unable to write alert to {:?}: {e}", self.path);
        }
    }
}

/// Fans each alert out to every configured sink
pub struct MultiSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    /// Standard sink stack: tracing always, JSONL when configured
    pub fn from_config(config: &AlertConfig) -> Result<Self> {
        let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(TracingSink)];
        if let Some(path) = &config.jsonl_path {
            sinks.push(Box::new(JsonlSink::open(path)?));
        }
        Ok(Self::new(sinks))
    }
}

impl AlertSink for MultiSink {
    fn emit(&self, alert: Alert) {
        for sink in &self.sinks {
            sink.emit(alert.clone());
        }
    }
}

/// Sink collecting alerts into a shared vector, for tests and tooling
pub struct CollectSink {
    alerts: std::sync::Arc<Mutex<Vec<Alert>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self {
            alerts: std::sync::Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the collected alerts
    pub fn handle(&self) -> std::sync::Arc<Mutex<Vec<Alert>>> {
        std::sync::Arc::clone(&self.alerts)
    }
}

impl Default for CollectSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for CollectSink {
    fn emit(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}
