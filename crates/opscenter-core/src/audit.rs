// crates/opscenter-core/src/audit.rs
// ============================================================================
// Module: Filter Audit Logging
// Description: Structured audit events for filter evaluation and policy changes.
// Purpose: Emit JSON-line audit records without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Evaluation failures never abort a batch; they are reported through a
//! [`FilterAuditSink`] and carried in the filter outcome. Policy changes are
//! reported when a configuration version is published or rejected. Events
//! never include expression inputs beyond record identifiers, and never
//! include key material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::filter::FilterFailure;
use crate::filter::FilterTarget;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit event for a record that could not be evaluated.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationFailureEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Which filter evaluated the record.
    pub target: FilterTarget,
    /// Identifier of the record (update id or file name).
    pub record_id: String,
    /// Owning update id for file records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_id: Option<String>,
    /// Expression source that failed.
    pub expression: String,
    /// Error message.
    pub error: String,
}

impl EvaluationFailureEvent {
    /// Creates an event from a filter failure with a consistent timestamp.
    #[must_use]
    pub fn new(failure: &FilterFailure) -> Self {
        Self {
            event: "filter_evaluation_failed",
            timestamp_ms: now_ms(),
            target: failure.target,
            record_id: failure.record_id.clone(),
            update_id: failure.update_id.clone(),
            expression: failure.expression.clone(),
            error: failure.error.to_string(),
        }
    }
}

/// Outcome of a policy replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyChangeOutcome {
    /// New version published.
    Published,
    /// Replacement rejected; previous version stays active.
    Rejected,
}

/// Audit event for a policy replacement attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyChangeEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Configuration section that changed.
    pub section: &'static str,
    /// Replacement outcome.
    pub outcome: PolicyChangeOutcome,
    /// Version active after the attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_version: Option<u64>,
    /// Error message for rejected replacements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PolicyChangeEvent {
    /// Creates an event for a published version.
    #[must_use]
    pub fn published(section: &'static str, version: u64) -> Self {
        Self {
            event: "policy_changed",
            timestamp_ms: now_ms(),
            section,
            outcome: PolicyChangeOutcome::Published,
            active_version: Some(version),
            error: None,
        }
    }

    /// Creates an event for a rejected replacement.
    #[must_use]
    pub fn rejected(section: &'static str, active_version: Option<u64>, error: String) -> Self {
        Self {
            event: "policy_changed",
            timestamp_ms: now_ms(),
            section,
            outcome: PolicyChangeOutcome::Rejected,
            active_version,
            error: Some(error),
        }
    }
}

/// Returns milliseconds since the Unix epoch, or zero if the clock is unset.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for filter events.
pub trait FilterAuditSink: Send + Sync {
    /// Records a per-record evaluation failure.
    fn record_evaluation_failure(&self, event: &EvaluationFailureEvent);

    /// Records a policy replacement attempt.
    fn record_policy_change(&self, _event: &PolicyChangeEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl FilterAuditSink for StderrAuditSink {
    fn record_evaluation_failure(&self, event: &EvaluationFailureEvent) {
        write_stderr(event);
    }

    fn record_policy_change(&self, event: &PolicyChangeEvent) {
        write_stderr(event);
    }
}

/// Writes one JSON line to stderr, ignoring failures.
fn write_stderr(event: &impl Serialize) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(io::stderr(), "{payload}");
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one JSON line, ignoring failures.
    fn append(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl FilterAuditSink for FileAuditSink {
    fn record_evaluation_failure(&self, event: &EvaluationFailureEvent) {
        self.append(event);
    }

    fn record_policy_change(&self, event: &PolicyChangeEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl FilterAuditSink for NoopAuditSink {
    fn record_evaluation_failure(&self, _event: &EvaluationFailureEvent) {}
}
