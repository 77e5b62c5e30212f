// crates/opscenter-core/src/lib.rs
// ============================================================================
// Module: Operations Center Core Library
// Description: Public API surface for update filtering and policy publication.
// Purpose: Expose records, filters, trust anchors, and versioned policy cells.
// Dependencies: crate::{audit, filter, pipeline, policy, publish, records, trust}
// ============================================================================

//! ## Overview
//! Operations Center decides, for every candidate update and every file of
//! an update, whether it is eligible for distribution. Two filter
//! expressions drive the decision and a root CA anchors manifest signature
//! verification. Configuration is compiled once per version and published
//! copy-on-write so evaluation never blocks on a replacement.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod filter;
pub mod pipeline;
pub mod policy;
pub mod publish;
pub mod records;
pub mod trust;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::EvaluationFailureEvent;
pub use audit::FileAuditSink;
pub use audit::FilterAuditSink;
pub use audit::NoopAuditSink;
pub use audit::PolicyChangeEvent;
pub use audit::PolicyChangeOutcome;
pub use audit::StderrAuditSink;
pub use filter::FileFilter;
pub use filter::FilterExpression;
pub use filter::FilterFailure;
pub use filter::FilterOutcome;
pub use filter::FilterTarget;
pub use filter::UpdateFilter;
pub use pipeline::filter_updates;
pub use policy::PolicyError;
pub use policy::PolicyState;
pub use policy::UpdatesPolicy;
pub use policy::UpdatesPolicyCell;
pub use policy::UpdatesPolicyInput;
pub use publish::ConfigVersion;
pub use publish::Published;
pub use publish::Snapshot;
pub use records::RecordSchemas;
pub use records::Update;
pub use records::UpdateFile;
pub use trust::SignatureRequirement;
pub use trust::TrustAnchor;
pub use trust::TrustAnchorError;
pub use trust::load_trust_anchor;
