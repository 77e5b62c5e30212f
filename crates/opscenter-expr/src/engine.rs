// crates/opscenter-expr/src/engine.rs
// ============================================================================
// Module: Expression Engine
// Description: Compiled expression handle and pluggable engine traits.
// Purpose: Let filters depend on a capability instead of a concrete parser.
// Dependencies: crate::{dsl, error, expr, schema, value}
// ============================================================================

//! ## Overview
//! [`compile`] turns source text into a [`CompiledExpression`] bound to one
//! [`Schema`]. Filters hold compiled predicates behind the
//! [`CompiledPredicate`] trait so alternative engines can be plugged in
//! through [`ExpressionEngine`]; [`BuiltinEngine`] is the default.
//!
//! Compiled expressions are immutable, `Send + Sync`, and evaluating one
//! never mutates the record or any process state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::dsl;
use crate::error::CompileError;
use crate::error::EvaluationError;
use crate::expr::Expr;
use crate::schema::Schema;
use crate::value::Record;

// ============================================================================
// SECTION: Traits
// ============================================================================

/// An evaluable boolean predicate over records.
pub trait CompiledPredicate: Send + Sync + fmt::Debug {
    /// Returns the source text the predicate was compiled from.
    fn source(&self) -> &str;

    /// Evaluates the predicate for one record.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when the record cannot be evaluated.
    fn evaluate(&self, record: &dyn Record) -> Result<bool, EvaluationError>;
}

/// Compiles expression source into shareable predicates.
pub trait ExpressionEngine: Send + Sync {
    /// Compiles `source` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when the source is not a valid boolean
    /// expression for the schema.
    fn compile(
        &self,
        source: &str,
        schema: &Schema,
    ) -> Result<Arc<dyn CompiledPredicate>, CompileError>;
}

// ============================================================================
// SECTION: Compiled Expression
// ============================================================================

/// Type-checked expression bound to the schema it was compiled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    /// Original source text.
    source: Box<str>,
    /// Record type name the expression was checked against.
    record: Box<str>,
    /// Root node.
    root: Expr,
}

impl CompiledExpression {
    /// Returns the source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the record type name the expression was compiled for.
    #[must_use]
    pub fn record_type(&self) -> &str {
        &self.record
    }

    /// Evaluates the expression against a record.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when a field is missing or mistyped, a
    /// helper fails, or the result is not boolean.
    pub fn evaluate(&self, record: &dyn Record) -> Result<bool, EvaluationError> {
        self.root.eval_bool(record)
    }
}

impl CompiledPredicate for CompiledExpression {
    fn source(&self) -> &str {
        Self::source(self)
    }

    fn evaluate(&self, record: &dyn Record) -> Result<bool, EvaluationError> {
        Self::evaluate(self, record)
    }
}

/// Compiles `source` against `schema` with the built-in parser.
///
/// # Errors
///
/// Returns [`CompileError`] for empty input, syntax errors, unknown
/// identifiers or helpers, type mismatches, and non-boolean expressions.
pub fn compile(source: &str, schema: &Schema) -> Result<CompiledExpression, CompileError> {
    let root = dsl::parse_expression(source, schema)?;
    Ok(CompiledExpression {
        source: source.into(),
        record: schema.name().into(),
        root,
    })
}

// ============================================================================
// SECTION: Built-in Engine
// ============================================================================

/// Default engine backed by [`compile`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine;

impl ExpressionEngine for BuiltinEngine {
    fn compile(
        &self,
        source: &str,
        schema: &Schema,
    ) -> Result<Arc<dyn CompiledPredicate>, CompileError> {
        Ok(Arc::new(compile(source, schema)?))
    }
}
