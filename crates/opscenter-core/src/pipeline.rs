// crates/opscenter-core/src/pipeline.rs
// ============================================================================
// Module: Filter Pipeline
// Description: Two-stage update then file filtering for one sync cycle.
// Purpose: Produce the update set handed to the distribution pipeline.
// Dependencies: crate::{audit, filter, policy, records}
// ============================================================================

//! ## Overview
//! [`filter_updates`] runs the update filter over the candidate batch and
//! then the file filter over the files of each surviving update only. Files
//! of a rejected update are never evaluated. An update whose files are all
//! rejected is kept with an empty file list.

use crate::audit::FilterAuditSink;
use crate::filter::FilterOutcome;
use crate::policy::UpdatesPolicy;
use crate::records::Update;

/// Filters `updates` and prunes the file lists of the survivors.
///
/// Failures are grouped by stage: all update-filter failures in input order,
/// then file-filter failures in order of the surviving updates.
#[must_use]
pub fn filter_updates(
    policy: &UpdatesPolicy,
    updates: Vec<Update>,
    sink: &dyn FilterAuditSink,
) -> FilterOutcome<Update> {
    let FilterOutcome {
        accepted,
        mut failures,
    } = policy.update_filter().apply(updates, sink);

    let file_filter = policy.file_filter();
    let mut filtered = Vec::with_capacity(accepted.len());
    for mut update in accepted {
        let files = std::mem::take(&mut update.files);
        let outcome = file_filter.apply(&update.id, files, sink);
        update.files = outcome.accepted;
        failures.extend(outcome.failures);
        filtered.push(update);
    }

    FilterOutcome {
        accepted: filtered,
        failures,
    }
}

impl UpdatesPolicy {
    /// Runs [`filter_updates`] with this policy.
    #[must_use]
    pub fn filter_updates(
        &self,
        updates: Vec<Update>,
        sink: &dyn FilterAuditSink,
    ) -> FilterOutcome<Update> {
        filter_updates(self, updates, sink)
    }
}
