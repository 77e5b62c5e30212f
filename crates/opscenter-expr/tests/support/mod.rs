// crates/opscenter-expr/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared result helpers and fixture records for expression tests.
// ============================================================================
//! ## Overview
//! Shared test helpers for consistent Result-based assertions, plus a
//! map-backed [`Record`] and the schemas used across integration tests.

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

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use opscenter_expr::Record;
use opscenter_expr::Schema;
use opscenter_expr::Value;
use opscenter_expr::ValueType;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across expression integration tests.
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
// Fixture Records
// ========================================================================

/// Owned field value stored by [`MapRecord`].
#[derive(Debug, Clone)]
pub enum Field {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// String.
    Str(String),
    /// String list.
    Strings(Vec<String>),
}

/// Record backed by a field map.
#[derive(Debug, Clone, Default)]
pub struct MapRecord {
    /// Fields by name.
    fields: BTreeMap<String, Field>,
}

impl MapRecord {
    /// Adds a string field.
    #[must_use]
    pub fn with_str(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), Field::Str(value.to_string()));
        self
    }

    /// Adds an integer field.
    #[must_use]
    pub fn with_int(mut self, name: &str, value: i64) -> Self {
        self.fields.insert(name.to_string(), Field::Int(value));
        self
    }

    /// Adds a boolean field.
    #[must_use]
    pub fn with_bool(mut self, name: &str, value: bool) -> Self {
        self.fields.insert(name.to_string(), Field::Bool(value));
        self
    }

    /// Adds a string list field.
    #[must_use]
    pub fn with_strings(mut self, name: &str, values: &[&str]) -> Self {
        let values = values.iter().map(ToString::to_string).collect();
        self.fields.insert(name.to_string(), Field::Strings(values));
        self
    }
}

impl Record for MapRecord {
    fn field(&self, name: &str) -> Option<Value<'_>> {
        Some(match self.fields.get(name)? {
            Field::Bool(value) => Value::Bool(*value),
            Field::Int(value) => Value::Int(*value),
            Field::Str(value) => Value::from(value.as_str()),
            Field::Strings(values) => Value::string_list(values.iter().map(String::as_str)),
        })
    }
}

/// Update-shaped schema used by most tests.
pub fn update_schema() -> Schema {
    Schema::builder("Update")
        .field("ID", ValueType::String)
        .field("Origin", ValueType::String)
        .field("Version", ValueType::String)
        .field("Severity", ValueType::String)
        .field("Channels", ValueType::StringList)
        .architecture_field("Architecture")
        .build()
        .unwrap()
}

/// File-shaped schema used by file-level tests.
pub fn file_schema() -> Schema {
    Schema::builder("UpdateFile")
        .field("Filename", ValueType::String)
        .field("Component", ValueType::String)
        .field("Type", ValueType::String)
        .field("Size", ValueType::Int)
        .architecture_field("Architecture")
        .build()
        .unwrap()
}

/// Update record with the given channels and architecture.
pub fn update(channels: &[&str], architecture: &str) -> MapRecord {
    MapRecord::default()
        .with_str("ID", "u-1")
        .with_str("Origin", "linuxcontainers.org")
        .with_str("Version", "202501010000")
        .with_str("Severity", "none")
        .with_strings("Channels", channels)
        .with_str("Architecture", architecture)
}

/// File record with the given name, size, and architecture.
pub fn file(filename: &str, size: i64, architecture: &str) -> MapRecord {
    MapRecord::default()
        .with_str("Filename", filename)
        .with_str("Component", "incus-os")
        .with_str("Type", "image-raw")
        .with_int("Size", size)
        .with_str("Architecture", architecture)
}
