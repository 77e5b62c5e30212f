// crates/opscenter-core/src/policy.rs
// ============================================================================
// Module: Updates Policy
// Description: Compiled filters and trust anchor for one updates configuration.
// Purpose: Compile configuration once per version and publish it atomically.
// Dependencies: crate::{audit, filter, publish, records, trust}, opscenter-expr
// ============================================================================

//! ## Overview
//! [`UpdatesPolicy::compile`] turns the four updates settings into two
//! [`FilterExpression`]s and an optional [`TrustAnchor`]. Any failure rejects
//! the whole input. [`UpdatesPolicyCell`] owns the active policy: a
//! replacement is compiled off to the side and only published when it
//! succeeds, so a rejected configuration never disturbs the active one.
//!
//! States of a cell:
//! - `Uncompiled`: nothing has been published yet.
//! - `Compiled`: a policy is active at the reported version.
//! - `Invalid`: the last replacement failed; the previous policy (if any)
//!   stays active.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use opscenter_expr::BuiltinEngine;
use opscenter_expr::CompileError;
use opscenter_expr::ExpressionEngine;
use opscenter_expr::SchemaError;
use thiserror::Error;

use crate::audit::FilterAuditSink;
use crate::audit::PolicyChangeEvent;
use crate::filter::FileFilter;
use crate::filter::FilterExpression;
use crate::filter::UpdateFilter;
use crate::publish::ConfigVersion;
use crate::publish::Snapshot;
use crate::records::RecordSchemas;
use crate::trust::SignatureRequirement;
use crate::trust::TrustAnchor;
use crate::trust::TrustAnchorError;
use crate::trust::load_trust_anchor;

/// Section name used in policy change audit events.
const POLICY_SECTION: &str = "updates";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while compiling an updates policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The update-level expression did not compile.
    #[error("invalid filter_expression: {0}")]
    UpdateFilter(CompileError),
    /// The file-level expression did not compile.
    #[error("invalid file_filter_expression: {0}")]
    FileFilter(CompileError),
    /// The root CA could not be loaded.
    #[error("invalid signature_verification_root_ca: {0}")]
    TrustAnchor(#[from] TrustAnchorError),
    /// The record schemas are malformed.
    #[error("invalid record schema: {0}")]
    Schema(#[from] SchemaError),
    /// The update source was rejected before compilation.
    #[error("invalid source: {0}")]
    Source(String),
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Updates settings a policy is compiled from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdatesPolicyInput<'a> {
    /// Update source URL; non-empty requires a root CA.
    pub source: &'a str,
    /// Root CA PEM used to verify update manifests.
    pub signature_verification_root_ca: &'a str,
    /// Update-level filter expression.
    pub filter_expression: &'a str,
    /// File-level filter expression.
    pub file_filter_expression: &'a str,
}

/// Compiled filters and trust anchor for one configuration version.
#[derive(Debug, Clone)]
pub struct UpdatesPolicy {
    /// Update-level filter.
    update_filter: UpdateFilter,
    /// File-level filter.
    file_filter: FileFilter,
    /// Root CA for manifest verification, when configured.
    trust_anchor: Option<TrustAnchor>,
}

impl UpdatesPolicy {
    /// Compiles `input` against the built-in record schemas.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when either expression fails to compile or
    /// the root CA cannot be loaded.
    pub fn compile(
        engine: &dyn ExpressionEngine,
        input: &UpdatesPolicyInput<'_>,
    ) -> Result<Self, PolicyError> {
        Self::compile_with_schemas(engine, &RecordSchemas::builtin()?, input)
    }

    /// Compiles `input` against caller-supplied record schemas.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when either expression fails to compile or
    /// the root CA cannot be loaded.
    pub fn compile_with_schemas(
        engine: &dyn ExpressionEngine,
        schemas: &RecordSchemas,
        input: &UpdatesPolicyInput<'_>,
    ) -> Result<Self, PolicyError> {
        let update_expression =
            FilterExpression::compile(engine, input.filter_expression, &schemas.update)
                .map_err(PolicyError::UpdateFilter)?;
        let file_expression =
            FilterExpression::compile(engine, input.file_filter_expression, &schemas.file)
                .map_err(PolicyError::FileFilter)?;
        let trust_anchor = load_trust_anchor(
            input.signature_verification_root_ca,
            SignatureRequirement::for_source(input.source),
        )?;
        Ok(Self {
            update_filter: UpdateFilter::new(update_expression),
            file_filter: FileFilter::new(file_expression),
            trust_anchor,
        })
    }

    /// Policy that accepts every update and file and has no trust anchor.
    #[must_use]
    pub const fn accept_all() -> Self {
        Self {
            update_filter: UpdateFilter::new(FilterExpression::AcceptAll),
            file_filter: FileFilter::new(FilterExpression::AcceptAll),
            trust_anchor: None,
        }
    }

    /// Returns the update-level filter.
    #[must_use]
    pub const fn update_filter(&self) -> &UpdateFilter {
        &self.update_filter
    }

    /// Returns the file-level filter.
    #[must_use]
    pub const fn file_filter(&self) -> &FileFilter {
        &self.file_filter
    }

    /// Returns the trust anchor, when one is configured.
    #[must_use]
    pub const fn trust_anchor(&self) -> Option<&TrustAnchor> {
        self.trust_anchor.as_ref()
    }
}

// ============================================================================
// SECTION: Policy Cell
// ============================================================================

/// Observable state of an [`UpdatesPolicyCell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyState {
    /// No policy has been published.
    Uncompiled,
    /// A policy is active.
    Compiled {
        /// Active version.
        version: ConfigVersion,
    },
    /// The last replacement failed.
    Invalid {
        /// Version that stayed active, if any.
        active: Option<ConfigVersion>,
        /// Why the replacement was rejected.
        error: PolicyError,
    },
}

/// Lock-guarded contents of a policy cell.
struct CellState {
    /// Active policy snapshot.
    active: Option<Snapshot<UpdatesPolicy>>,
    /// Error of the most recent failed replacement, cleared on success.
    last_error: Option<PolicyError>,
}

/// Holds the active updates policy and publishes replacements.
pub struct UpdatesPolicyCell {
    /// Engine used to compile expressions.
    engine: Arc<dyn ExpressionEngine>,
    /// Schemas expressions are compiled against.
    schemas: RecordSchemas,
    /// Active policy and last failure.
    state: RwLock<CellState>,
}

impl UpdatesPolicyCell {
    /// Creates an empty cell.
    #[must_use]
    pub const fn new(engine: Arc<dyn ExpressionEngine>, schemas: RecordSchemas) -> Self {
        Self {
            engine,
            schemas,
            state: RwLock::new(CellState {
                active: None,
                last_error: None,
            }),
        }
    }

    /// Creates an empty cell using the built-in engine and schemas.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Schema`] when the built-in schemas are malformed.
    pub fn with_builtin_engine() -> Result<Self, PolicyError> {
        Ok(Self::new(Arc::new(BuiltinEngine), RecordSchemas::builtin()?))
    }

    /// Returns the schemas expressions are compiled against.
    #[must_use]
    pub const fn schemas(&self) -> &RecordSchemas {
        &self.schemas
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PolicyState {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let active = state.active.as_ref().map(|snapshot| snapshot.version);
        match (&state.last_error, active) {
            (Some(error), active) => PolicyState::Invalid {
                active,
                error: error.clone(),
            },
            (None, Some(version)) => PolicyState::Compiled {
                version,
            },
            (None, None) => PolicyState::Uncompiled,
        }
    }

    /// Returns the active policy snapshot, if any.
    #[must_use]
    pub fn current(&self) -> Option<Snapshot<UpdatesPolicy>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).active.clone()
    }

    /// Compiles `input` and publishes it as the next version.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when compilation fails; the previously active
    /// policy stays published and the cell reports `Invalid`.
    pub fn replace(
        &self,
        input: &UpdatesPolicyInput<'_>,
        sink: &dyn FilterAuditSink,
    ) -> Result<ConfigVersion, PolicyError> {
        let policy = match UpdatesPolicy::compile_with_schemas(
            self.engine.as_ref(),
            &self.schemas,
            input,
        ) {
            Ok(policy) => policy,
            Err(error) => {
                self.reject(error.clone(), sink);
                return Err(error);
            }
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let version = state
            .active
            .as_ref()
            .map_or(ConfigVersion::INITIAL, |snapshot| snapshot.version.next());
        state.active = Some(Snapshot {
            version,
            value: Arc::new(policy),
        });
        state.last_error = None;
        drop(state);
        sink.record_policy_change(&PolicyChangeEvent::published(POLICY_SECTION, version.get()));
        Ok(version)
    }

    /// Records a rejected replacement, including one that failed validation
    /// before reaching the cell.
    ///
    /// The active policy stays published, the cell reports `Invalid`, and the
    /// rejection is audited.
    pub fn reject(&self, error: PolicyError, sink: &dyn FilterAuditSink) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let active = state.active.as_ref().map(|snapshot| snapshot.version.get());
        let reason = error.to_string();
        state.last_error = Some(error);
        drop(state);
        sink.record_policy_change(&PolicyChangeEvent::rejected(POLICY_SECTION, active, reason));
    }
}

impl fmt::Debug for UpdatesPolicyCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatesPolicyCell").field("state", &self.state()).finish_non_exhaustive()
    }
}
