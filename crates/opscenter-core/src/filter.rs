// crates/opscenter-core/src/filter.rs
// ============================================================================
// Module: Update and File Filters
// Description: Compiled filter expressions applied to update and file batches.
// Purpose: Decide eligibility per record while isolating evaluation failures.
// Dependencies: crate::{audit, records}, opscenter-expr, serde
// ============================================================================

//! ## Overview
//! A [`FilterExpression`] is either the constant accept produced by an empty
//! expression string or a predicate compiled by an [`ExpressionEngine`].
//! [`UpdateFilter`] and [`FileFilter`] apply one expression to a batch and
//! return the order-preserving subsequence that evaluated to `true`.
//!
//! Security posture: records come from external provisioning sources and are
//! untrusted. A record that fails evaluation is excluded (fail closed),
//! reported to the audit sink, and listed in [`FilterOutcome::failures`]; the
//! rest of the batch is still evaluated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use opscenter_expr::CompileError;
use opscenter_expr::CompiledPredicate;
use opscenter_expr::EvaluationError;
use opscenter_expr::ExpressionEngine;
use opscenter_expr::Record;
use opscenter_expr::Schema;
use serde::Serialize;

use crate::audit::EvaluationFailureEvent;
use crate::audit::FilterAuditSink;
use crate::records::Update;
use crate::records::UpdateFile;

// ============================================================================
// SECTION: Filter Expression
// ============================================================================

/// Filter stage a record is evaluated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterTarget {
    /// Update-level filter.
    Update,
    /// File-level filter.
    File,
}

impl FilterTarget {
    /// Returns a stable label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::File => "file",
        }
    }
}

impl fmt::Display for FilterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled filter, or the constant accept of an empty expression.
#[derive(Debug, Clone)]
pub enum FilterExpression {
    /// Empty expression; every record passes.
    AcceptAll,
    /// Compiled predicate.
    Compiled(Arc<dyn CompiledPredicate>),
}

impl FilterExpression {
    /// Compiles `source` against `schema`.
    ///
    /// Empty and whitespace-only sources yield [`FilterExpression::AcceptAll`]
    /// without invoking the engine.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when the engine rejects a non-empty source.
    pub fn compile(
        engine: &dyn ExpressionEngine,
        source: &str,
        schema: &Schema,
    ) -> Result<Self, CompileError> {
        if source.trim().is_empty() {
            return Ok(Self::AcceptAll);
        }
        engine.compile(source, schema).map(Self::Compiled)
    }

    /// Returns true for the constant accept.
    #[must_use]
    pub const fn is_accept_all(&self) -> bool {
        matches!(self, Self::AcceptAll)
    }

    /// Returns the source text; empty for the constant accept.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::AcceptAll => "",
            Self::Compiled(predicate) => predicate.source(),
        }
    }

    /// Evaluates one record.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when the compiled predicate fails.
    pub fn evaluate(&self, record: &dyn Record) -> Result<bool, EvaluationError> {
        match self {
            Self::AcceptAll => Ok(true),
            Self::Compiled(predicate) => predicate.evaluate(record),
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// A record excluded because its evaluation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterFailure {
    /// Filter stage.
    pub target: FilterTarget,
    /// Update id or file name.
    pub record_id: String,
    /// Owning update id for file records.
    pub update_id: Option<String>,
    /// Expression source that failed.
    pub expression: String,
    /// Evaluation error.
    pub error: EvaluationError,
}

/// Result of applying a filter to a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome<T> {
    /// Records that evaluated to `true`, in input order.
    pub accepted: Vec<T>,
    /// Records excluded because evaluation failed.
    pub failures: Vec<FilterFailure>,
}

impl<T> Default for FilterOutcome<T> {
    fn default() -> Self {
        Self {
            accepted: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Applies `expression` to `items`, keeping matches and reporting failures.
fn retain_matching<T: Record>(
    expression: &FilterExpression,
    target: FilterTarget,
    items: Vec<T>,
    record_id: impl Fn(&T) -> &str,
    update_id: Option<&str>,
    sink: &dyn FilterAuditSink,
) -> FilterOutcome<T> {
    if expression.is_accept_all() {
        return FilterOutcome {
            accepted: items,
            failures: Vec::new(),
        };
    }
    let mut outcome = FilterOutcome {
        accepted: Vec::with_capacity(items.len()),
        failures: Vec::new(),
    };
    for item in items {
        match expression.evaluate(&item) {
            Ok(true) => outcome.accepted.push(item),
            Ok(false) => {}
            Err(error) => {
                let failure = FilterFailure {
                    target,
                    record_id: record_id(&item).to_string(),
                    update_id: update_id.map(ToString::to_string),
                    expression: expression.source().to_string(),
                    error,
                };
                sink.record_evaluation_failure(&EvaluationFailureEvent::new(&failure));
                outcome.failures.push(failure);
            }
        }
    }
    outcome
}

// ============================================================================
// SECTION: Update Filter
// ============================================================================

/// Applies the update-level expression to candidate updates.
#[derive(Debug, Clone)]
pub struct UpdateFilter {
    /// Update-level expression.
    expression: FilterExpression,
}

impl UpdateFilter {
    /// Creates a filter from a compiled expression.
    #[must_use]
    pub const fn new(expression: FilterExpression) -> Self {
        Self {
            expression,
        }
    }

    /// Returns the expression.
    #[must_use]
    pub const fn expression(&self) -> &FilterExpression {
        &self.expression
    }

    /// Returns whether a single update is eligible.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when the update cannot be evaluated.
    pub fn matches(&self, update: &Update) -> Result<bool, EvaluationError> {
        self.expression.evaluate(update)
    }

    /// Returns the updates that pass, in input order.
    ///
    /// File lists are left untouched; see [`crate::filter_updates`] for the
    /// full pipeline.
    #[must_use]
    pub fn apply(&self, updates: Vec<Update>, sink: &dyn FilterAuditSink) -> FilterOutcome<Update> {
        retain_matching(
            &self.expression,
            FilterTarget::Update,
            updates,
            |update| update.id.as_str(),
            None,
            sink,
        )
    }
}

// ============================================================================
// SECTION: File Filter
// ============================================================================

/// Applies the file-level expression to the files of one update.
#[derive(Debug, Clone)]
pub struct FileFilter {
    /// File-level expression.
    expression: FilterExpression,
}

impl FileFilter {
    /// Creates a filter from a compiled expression.
    #[must_use]
    pub const fn new(expression: FilterExpression) -> Self {
        Self {
            expression,
        }
    }

    /// Returns the expression.
    #[must_use]
    pub const fn expression(&self) -> &FilterExpression {
        &self.expression
    }

    /// Returns whether a single file is eligible.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when the file cannot be evaluated.
    pub fn matches(&self, file: &UpdateFile) -> Result<bool, EvaluationError> {
        self.expression.evaluate(file)
    }

    /// Returns the files of `update_id` that pass, in input order.
    #[must_use]
    pub fn apply(
        &self,
        update_id: &str,
        files: Vec<UpdateFile>,
        sink: &dyn FilterAuditSink,
    ) -> FilterOutcome<UpdateFile> {
        retain_matching(
            &self.expression,
            FilterTarget::File,
            files,
            |file| file.filename.as_str(),
            Some(update_id),
            sink,
        )
    }
}
