// crates/opscenter-core/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared fixtures for filter, trust anchor, and policy tests.
// ============================================================================
//! ## Overview
//! Result helpers, sample records, a recording audit sink, an engine that
//! counts predicate evaluations, and generated CA certificates.

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
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use opscenter_core::EvaluationFailureEvent;
use opscenter_core::FilterAuditSink;
use opscenter_core::PolicyChangeEvent;
use opscenter_core::Update;
use opscenter_core::UpdateFile;
use opscenter_expr::BuiltinEngine;
use opscenter_expr::CompileError;
use opscenter_expr::CompiledPredicate;
use opscenter_expr::EvaluationError;
use opscenter_expr::ExpressionEngine;
use opscenter_expr::Record;
use opscenter_expr::Schema;
use rcgen::BasicConstraints;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::IsCa;
use rcgen::KeyPair;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across core integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Records
// ========================================================================

/// Builds a file with an optional architecture.
pub fn file(filename: &str, architecture: Option<&str>) -> UpdateFile {
    UpdateFile {
        filename: filename.to_string(),
        url: format!("https://images.example.org/{filename}"),
        size: 1024,
        sha256: "0".repeat(64),
        component: "os".to_string(),
        file_type: "image-raw".to_string(),
        architecture: architecture.map(ToString::to_string),
    }
}

/// Builds an update with the given channels and files.
pub fn update(id: &str, channels: &[&str], files: Vec<UpdateFile>) -> Update {
    Update {
        id: id.to_string(),
        origin: "images.example.org".to_string(),
        external_id: format!("ext-{id}"),
        version: "202501010000".to_string(),
        published_at: "2025-01-01T00:00:00Z".to_string(),
        severity: "none".to_string(),
        status: "ready".to_string(),
        channels: channels.iter().map(ToString::to_string).collect(),
        architecture: None,
        url: format!("https://images.example.org/{id}"),
        changelog: String::new(),
        files,
    }
}

/// Returns the ids of `updates` in order.
pub fn ids(updates: &[Update]) -> Vec<&str> {
    updates.iter().map(|update| update.id.as_str()).collect()
}

/// Returns the file names of `update` in order.
pub fn filenames(update: &Update) -> Vec<&str> {
    update.files.iter().map(|file| file.filename.as_str()).collect()
}

// ========================================================================
// Audit Sink
// ========================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Evaluation failure events.
    pub failures: Mutex<Vec<EvaluationFailureEvent>>,
    /// Policy change events.
    pub changes: Mutex<Vec<PolicyChangeEvent>>,
}

impl FilterAuditSink for RecordingSink {
    fn record_evaluation_failure(&self, event: &EvaluationFailureEvent) {
        self.failures.lock().unwrap().push(event.clone());
    }

    fn record_policy_change(&self, event: &PolicyChangeEvent) {
        self.changes.lock().unwrap().push(event.clone());
    }
}

// ========================================================================
// Counting Engine
// ========================================================================

/// Engine wrapping [`BuiltinEngine`] that counts compilations and evaluations.
#[derive(Default)]
pub struct CountingEngine {
    /// Number of `compile` calls.
    pub compiles: AtomicUsize,
    /// Number of predicate evaluations, shared with compiled predicates.
    pub evaluations: Arc<AtomicUsize>,
}

/// Predicate that counts evaluations before delegating.
#[derive(Debug)]
struct CountingPredicate {
    /// Delegate predicate.
    inner: Arc<dyn CompiledPredicate>,
    /// Shared evaluation counter.
    evaluations: Arc<AtomicUsize>,
}

impl CompiledPredicate for CountingPredicate {
    fn source(&self) -> &str {
        self.inner.source()
    }

    fn evaluate(&self, record: &dyn Record) -> Result<bool, EvaluationError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate(record)
    }
}

impl ExpressionEngine for CountingEngine {
    fn compile(
        &self,
        source: &str,
        schema: &Schema,
    ) -> Result<Arc<dyn CompiledPredicate>, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let inner = BuiltinEngine.compile(source, schema)?;
        Ok(Arc::new(CountingPredicate {
            inner,
            evaluations: Arc::clone(&self.evaluations),
        }))
    }
}

impl CountingEngine {
    /// Returns the number of compile calls.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Returns the number of evaluations.
    pub fn evaluation_count(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

// ========================================================================
// Certificates
// ========================================================================

/// Generated certificate PEM and its private key PEM.
pub struct GeneratedCert {
    /// Certificate PEM.
    pub cert_pem: String,
    /// Private key PEM.
    pub key_pem: String,
}

/// Generates a self-signed CA certificate.
pub fn generate_ca(common_name: &str) -> TestResult<GeneratedCert> {
    let key = KeyPair::generate()?;
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;
    let cert = params.self_signed(&key)?;
    Ok(GeneratedCert {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}
