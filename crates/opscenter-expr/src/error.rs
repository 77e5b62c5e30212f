// crates/opscenter-expr/src/error.rs
// ============================================================================
// Module: Expression Errors
// Description: Compile, evaluation, and schema error definitions.
// Purpose: Give configuration-time and per-record failures distinct types so
//          callers can apply different recovery policies.
// Dependencies: crate::value, thiserror
// ============================================================================

//! ## Overview
//! [`CompileError`] is raised while turning source text into a compiled
//! expression and is fatal to the configuration that carried it.
//! [`EvaluationError`] is raised for a single record and only excludes that
//! record. Positions are byte offsets into the expression source.

use thiserror::Error;

use crate::value::ValueType;

// ============================================================================
// SECTION: Compile Errors
// ============================================================================

/// Errors raised while compiling an expression.
///
/// # Invariants
/// - `position` fields are byte offsets into the original source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Source was empty or whitespace only.
    #[error("expression is empty")]
    EmptyInput,
    /// Source exceeded the size limit.
    #[error("expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual source length in bytes.
        actual_bytes: usize,
    },
    /// Source exceeded the nesting limit.
    #[error("expression nesting exceeds limit: depth {actual_depth} (max {max_depth}) at {position}")]
    NestingTooDeep {
        /// Maximum allowed depth.
        max_depth: usize,
        /// Depth reached.
        actual_depth: usize,
        /// Byte offset.
        position: usize,
    },
    /// Unexpected token.
    #[error("unexpected token `{found}` at {position}, expected {expected}")]
    UnexpectedToken {
        /// Expectation summary.
        expected: &'static str,
        /// Token actually seen.
        found: String,
        /// Byte offset.
        position: usize,
    },
    /// String literal without a closing quote.
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// Unsupported escape sequence inside a string literal.
    #[error("invalid escape sequence `\\{sequence}` at {position}")]
    InvalidEscape {
        /// Character following the backslash.
        sequence: char,
        /// Byte offset of the backslash.
        position: usize,
    },
    /// Integer literal out of range.
    #[error("invalid integer literal `{raw}` at {position}")]
    InvalidNumber {
        /// Raw literal text.
        raw: String,
        /// Byte offset.
        position: usize,
    },
    /// Identifier is not a field of the record schema.
    #[error("unknown identifier `{name}` at {position} (record {record})")]
    UnknownIdentifier {
        /// Identifier text.
        name: String,
        /// Record type name.
        record: String,
        /// Byte offset.
        position: usize,
    },
    /// Function name is not a known helper.
    #[error("unknown function `{name}` at {position}")]
    UnknownFunction {
        /// Function name.
        name: String,
        /// Byte offset.
        position: usize,
    },
    /// Helper exists but cannot be used with this record type.
    #[error("function `{name}` is not available for record {record}: {reason}")]
    FunctionUnavailable {
        /// Function name.
        name: &'static str,
        /// Record type name.
        record: String,
        /// Why the helper is unavailable.
        reason: &'static str,
    },
    /// Wrong number of arguments.
    #[error("function `{name}` expects {expected} argument(s), got {actual} at {position}")]
    ArityMismatch {
        /// Function name.
        name: &'static str,
        /// Expected argument count.
        expected: usize,
        /// Actual argument count.
        actual: usize,
        /// Byte offset of the call.
        position: usize,
    },
    /// Operand types do not fit the operator or function.
    #[error("type mismatch at {position}: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
        /// Byte offset.
        position: usize,
    },
    /// The whole expression is not boolean.
    #[error("expression must evaluate to bool, found {found}")]
    NotBoolean {
        /// Static type of the expression.
        found: ValueType,
    },
    /// Input continued after a complete expression.
    #[error("unexpected trailing input at {position}")]
    TrailingInput {
        /// Byte offset.
        position: usize,
    },
}

// ============================================================================
// SECTION: Evaluation Errors
// ============================================================================

/// Errors raised while evaluating a compiled expression for one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// Record did not provide a declared field.
    #[error("record does not provide field `{field}`")]
    MissingField {
        /// Field name.
        field: String,
    },
    /// Record provided a value that disagrees with the schema.
    #[error("field `{field}` has type {actual}, expected {expected}")]
    FieldTypeMismatch {
        /// Field name.
        field: String,
        /// Declared type.
        expected: ValueType,
        /// Type of the provided value.
        actual: ValueType,
    },
    /// A helper function rejected its input.
    #[error("function `{function}` failed: {message}")]
    Function {
        /// Function name.
        function: &'static str,
        /// Failure description.
        message: String,
    },
    /// Result or connective operand was not boolean.
    #[error("expression did not evaluate to bool, found {found}")]
    NotBoolean {
        /// Type of the value found.
        found: ValueType,
    },
    /// Operator applied to values it does not support.
    #[error("operator `{operator}` cannot be applied to {lhs} and {rhs}")]
    OperandMismatch {
        /// Operator symbol.
        operator: &'static str,
        /// Left operand type.
        lhs: ValueType,
        /// Right operand type.
        rhs: ValueType,
    },
}

// ============================================================================
// SECTION: Schema Errors
// ============================================================================

/// Errors raised while building a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Field name is not a valid identifier.
    #[error("invalid field name `{0}`")]
    InvalidFieldName(String),
    /// Field declared twice.
    #[error("duplicate field `{0}`")]
    DuplicateField(String),
    /// Architecture field declared with a non-string type.
    #[error("architecture field `{field}` must be a string, found {found}")]
    ArchitectureFieldType {
        /// Field name.
        field: String,
        /// Declared type.
        found: ValueType,
    },
}
