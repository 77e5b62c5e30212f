// crates/opscenter-core/tests/filters.rs
// ============================================================================
// Test Module: Update and File Filters
// Coverage: Empty-expression accept, ordering, error isolation, audit output.
// ============================================================================
//! ## Overview
//! Integration tests for [`UpdateFilter`], [`FileFilter`], and
//! [`FilterExpression`].

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use std::fs;

use opscenter_core::FileAuditSink;
use opscenter_core::FileFilter;
use opscenter_core::FilterExpression;
use opscenter_core::FilterTarget;
use opscenter_core::NoopAuditSink;
use opscenter_core::RecordSchemas;
use opscenter_core::UpdateFilter;
use opscenter_expr::BuiltinEngine;
use opscenter_expr::EvaluationError;
use support::CountingEngine;
use support::RecordingSink;
use support::TestResult;
use support::ensure;
use support::file;
use support::ids;
use support::update;

/// Compiles an update-level filter with the built-in engine.
fn update_filter(source: &str) -> TestResult<UpdateFilter> {
    let schemas = RecordSchemas::builtin()?;
    Ok(UpdateFilter::new(FilterExpression::compile(&BuiltinEngine, source, &schemas.update)?))
}

/// Compiles a file-level filter with the built-in engine.
fn file_filter(source: &str) -> TestResult<FileFilter> {
    let schemas = RecordSchemas::builtin()?;
    Ok(FileFilter::new(FilterExpression::compile(&BuiltinEngine, source, &schemas.file)?))
}

// ========================================================================
// Empty Expressions
// ========================================================================

#[test]
fn empty_expressions_accept_without_invoking_engine() -> TestResult {
    let schemas = RecordSchemas::builtin()?;
    let engine = CountingEngine::default();
    for source in ["", "   ", "\n\t "] {
        let expression = FilterExpression::compile(&engine, source, &schemas.update)?;
        ensure(expression.is_accept_all(), format!("`{source:?}` should accept all"))?;
        ensure(expression.source().is_empty(), "accept-all has no source")?;
    }
    let filter = UpdateFilter::new(FilterExpression::compile(&engine, "", &schemas.update)?);
    let updates = vec![update("a", &[], vec![]), update("b", &["daily"], vec![])];
    let outcome = filter.apply(updates.clone(), &NoopAuditSink);
    ensure(outcome.accepted == updates, "all updates should pass unchanged")?;
    ensure(engine.compile_count() == 0, "engine must not compile empty expressions")?;
    ensure(engine.evaluation_count() == 0, "engine must not evaluate empty expressions")
}

#[test]
fn compile_errors_surface_from_engine() -> TestResult {
    let schemas = RecordSchemas::builtin()?;
    ensure(
        FilterExpression::compile(&BuiltinEngine, "'stable' in", &schemas.update).is_err(),
        "syntax error",
    )?;
    ensure(
        FilterExpression::compile(&BuiltinEngine, "Size > 1", &schemas.update).is_err(),
        "file field in update context",
    )?;
    ensure(
        FilterExpression::compile(&BuiltinEngine, "Size > 1", &schemas.file).is_ok(),
        "file field in file context",
    )
}

// ========================================================================
// Update Filter
// ========================================================================

#[test]
fn update_filter_keeps_matching_updates_in_order() -> TestResult {
    let filter = update_filter("'stable' in Channels")?;
    let updates = vec![
        update("u1", &["stable"], vec![]),
        update("u2", &["daily"], vec![]),
        update("u3", &["daily", "stable"], vec![]),
        update("u4", &[], vec![]),
    ];
    let outcome = filter.apply(updates, &NoopAuditSink);
    ensure(ids(&outcome.accepted) == ["u1", "u3"], format!("got {:?}", ids(&outcome.accepted)))?;
    ensure(outcome.failures.is_empty(), "no failures expected")
}

#[test]
fn update_filter_handles_empty_batches() -> TestResult {
    let outcome = update_filter("'stable' in Channels")?.apply(Vec::new(), &NoopAuditSink);
    ensure(outcome.accepted.is_empty() && outcome.failures.is_empty(), "empty in, empty out")
}

#[test]
fn evaluation_errors_exclude_only_the_failing_update() -> TestResult {
    // Updates on the edge channel short-circuit before the malformed helper call.
    let filter = update_filter("'edge' in Channels || AppliesToArchitecture('x86 64')")?;
    let sink = RecordingSink::default();
    let updates = vec![
        update("u1", &["edge"], vec![]),
        update("u2", &["stable"], vec![]),
        update("u3", &["edge"], vec![]),
    ];
    let outcome = filter.apply(updates, &sink);
    ensure(ids(&outcome.accepted) == ["u1", "u3"], "batch should continue past the failure")?;
    ensure(outcome.failures.len() == 1, "one failure expected")?;
    let failure = &outcome.failures[0];
    ensure(failure.target == FilterTarget::Update, "update target")?;
    ensure(failure.record_id == "u2", "failing record id")?;
    ensure(failure.update_id.is_none(), "no owning update for update records")?;
    ensure(matches!(failure.error, EvaluationError::Function { .. }), "helper failure")?;

    let events = sink.failures.lock().unwrap();
    ensure(events.len() == 1, "failure reported to the audit sink")?;
    ensure(events[0].event == "filter_evaluation_failed", "event name")?;
    ensure(events[0].record_id == "u2", "event record id")
}

// ========================================================================
// File Filter
// ========================================================================

#[test]
fn file_filter_applies_architecture_helper() -> TestResult {
    let filter = file_filter("AppliesToArchitecture('x86_64')")?;
    let files =
        vec![file("a.img", Some("x86_64")), file("b.img", Some("aarch64")), file("c.img", None)];
    let outcome = filter.apply("u1", files, &NoopAuditSink);
    let names: Vec<_> = outcome.accepted.iter().map(|f| f.filename.as_str()).collect();
    ensure(names == ["a.img", "c.img"], format!("got {names:?}"))
}

#[test]
fn file_filter_compares_architecture_field_directly() -> TestResult {
    let filter = file_filter("Architecture == 'x86_64'")?;
    let files = vec![file("a.img", Some("x86_64")), file("c.img", None)];
    let outcome = filter.apply("u1", files, &NoopAuditSink);
    ensure(outcome.accepted.len() == 1, "unset architecture reads as empty string")
}

#[test]
fn file_failures_name_owning_update() -> TestResult {
    let filter = file_filter("AppliesToArchitecture('')")?;
    let sink = RecordingSink::default();
    let outcome = filter.apply("u9", vec![file("a.img", None)], &sink);
    ensure(outcome.accepted.is_empty(), "failing file excluded")?;
    let failure = &outcome.failures[0];
    ensure(failure.target == FilterTarget::File, "file target")?;
    ensure(failure.record_id == "a.img", "file name as record id")?;
    ensure(failure.update_id.as_deref() == Some("u9"), "owning update id")?;
    ensure(failure.expression == "AppliesToArchitecture('')", "expression recorded")
}

// ========================================================================
// Audit Sinks
// ========================================================================

#[test]
fn file_audit_sink_writes_json_lines() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.log");
    let sink = FileAuditSink::new(&path)?;
    let filter = update_filter("AppliesToArchitecture('-/-')")?;
    let _ = filter.apply(vec![update("u1", &[], vec![]), update("u2", &[], vec![])], &sink);

    let contents = fs::read_to_string(&path)?;
    let lines: Vec<&str> = contents.lines().collect();
    ensure(lines.len() == 2, format!("expected two events, got {}", lines.len()))?;
    for (line, id) in lines.iter().zip(["u1", "u2"]) {
        let value: serde_json::Value = serde_json::from_str(line)?;
        ensure(value["event"] == "filter_evaluation_failed", "event name")?;
        ensure(value["target"] == "update", "target label")?;
        ensure(value["record_id"] == id, "record id")?;
        ensure(value.get("update_id").is_none(), "update id omitted for updates")?;
        ensure(value["timestamp_ms"].is_u64(), "timestamp present")?;
    }
    Ok(())
}
