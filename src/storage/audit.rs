// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for provisioning outcomes.
//!
//! Every provisioning call emits one event per chain outcome plus one
//! summary event. Emission is best-effort relative to the primary
//! operation: a sink failure is logged and swallowed, never surfaced to
//! the caller.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Types of auditable provisioning events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// One chain account was provisioned (or found already provisioned).
    AccountProvisioned,
    /// One chain account failed to provision.
    AccountProvisionFailed,
    /// Aggregate result of one provisioning call.
    ProvisionSummary,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User the provisioning ran for.
    pub user_id: String,
    /// Chain this event is scoped to (absent for summary events).
    pub chain: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, user_id: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: user_id.into(),
            chain: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = Some(chain.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outbound port for the audit-log sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// File-backed sink appending events to a daily JSONL file.
pub struct JsonlAuditSink {
    dir: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.jsonl"))
    }

    /// Read back all events for a date. Used by tests and operator tooling.
    pub fn read_events(&self, date: &str) -> Result<Vec<AuditEvent>, AuditError> {
        let content = std::fs::read_to_string(self.file_for(date))?;
        let mut events = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        use std::io::Write;

        std::fs::create_dir_all(&self.dir)?;

        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let line = serde_json::to_string(&event)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(&date))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
