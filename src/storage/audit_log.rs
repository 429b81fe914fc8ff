//! Audit trail of accepted messages
//!
//! Records are appended as JSON lines to one file per calendar day, the day
//! being taken in the configured time zone. Recording never blocks the
//! caller: records are handed to a writer task and write errors are only
//! logged.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::error::Result;

/// One accepted message, as the sender wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub username: String,
    pub ip: String,
    pub content: String,
    pub time_sent: DateTime<Utc>,
}

#[derive(Serialize)]
struct AuditLine<'a> {
    username: &'a str,
    ip: &'a str,
    content: &'a str,
    time_sent: String,
}

/// Best-effort sink for audit records
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Per-day JSON-lines files under a directory
pub struct JsonlAuditLog {
    sender: mpsc::UnboundedSender<AuditRecord>,
}

impl JsonlAuditLog {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(dir: PathBuf, timezone: Tz) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditRecord>();

        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(e) = append_record(&dir, timezone, &record).await {
                    log::error!("Failed to write audit record for {}: {}", record.username, e);
                }
            }
            log::debug!("Audit writer shutting down");
        });

        Self { sender }
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, record: AuditRecord) {
        if self.sender.send(record).is_err() {
            log::warn!("Audit writer is gone, dropping record");
        }
    }
}

/// File holding the records of the day `time` falls on in `timezone`
pub fn audit_file_path(dir: &Path, timezone: Tz, time: DateTime<Utc>) -> PathBuf {
    let local = time.with_timezone(&timezone);
    dir.join(format!("{}.json", local.format("%Y-%m-%d")))
}

async fn append_record(dir: &Path, timezone: Tz, record: &AuditRecord) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let line = AuditLine {
        username: &record.username,
        ip: &record.ip,
        content: &record.content,
        time_sent: record.time_sent.with_timezone(&timezone).to_rfc3339(),
    };
    let mut encoded = serde_json::to_vec(&line)?;
    encoded.push(b'\n');

    let path = audit_file_path(dir, timezone, record.time_sent);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(&encoded).await?;
    file.flush().await?;
    Ok(())
}

/// Keeps records in memory, for tests and local runs
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

// Shared reference to the audit sink
pub type SharedAuditSink = Arc<dyn AuditSink>;
