// crates/opscenter-expr/src/functions.rs
// ============================================================================
// Module: Helper Functions
// Description: Built-in helpers callable from filter expressions.
// Purpose: Resolve helper calls at compile time and run them at evaluation.
// Dependencies: crate::{error, schema, value}
// ============================================================================

//! ## Overview
//! Helpers are resolved by name while parsing so arity and argument types are
//! checked once. `AppliesToArchitecture` binds to the schema's architecture
//! field at compile time; records without one cannot use it.

use std::borrow::Cow;

use crate::error::CompileError;
use crate::error::EvaluationError;
use crate::schema::Schema;
use crate::value::Record;
use crate::value::Value;
use crate::value::ValueType;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Names of all built-in helpers.
pub const BUILTIN_FUNCTIONS: &[&str] = &[APPLIES_TO_ARCHITECTURE, "len", "lower", "upper"];

/// Name of the architecture matching helper.
pub const APPLIES_TO_ARCHITECTURE: &str = "AppliesToArchitecture";

/// Maximum accepted architecture name length in bytes.
const MAX_ARCHITECTURE_BYTES: usize = 64;

// ============================================================================
// SECTION: Function Definitions
// ============================================================================

/// A resolved helper call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Function {
    /// `AppliesToArchitecture(arch)` bound to the record's architecture field.
    AppliesToArchitecture {
        /// Architecture field name in the record.
        field: Box<str>,
    },
    /// `len(string | list)`.
    Len,
    /// `lower(string)`.
    Lower,
    /// `upper(string)`.
    Upper,
}

impl Function {
    /// Returns the helper name as written in expressions.
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::AppliesToArchitecture {
                ..
            } => APPLIES_TO_ARCHITECTURE,
            Self::Len => "len",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    /// Runs the helper with already evaluated arguments.
    pub(crate) fn call<'a>(
        &'a self,
        mut args: Vec<Value<'a>>,
        record: &'a dyn Record,
    ) -> Result<Value<'a>, EvaluationError> {
        let arg = args.pop().ok_or_else(|| EvaluationError::Function {
            function: self.name(),
            message: "missing argument".to_string(),
        })?;
        match self {
            Self::AppliesToArchitecture {
                field,
            } => {
                let wanted = self.string_arg(&arg)?;
                validate_architecture(wanted).map_err(|message| EvaluationError::Function {
                    function: APPLIES_TO_ARCHITECTURE,
                    message,
                })?;
                let actual = record.field(field).ok_or_else(|| EvaluationError::MissingField {
                    field: field.to_string(),
                })?;
                let Value::Str(actual) = actual else {
                    return Err(EvaluationError::FieldTypeMismatch {
                        field: field.to_string(),
                        expected: ValueType::String,
                        actual: actual.value_type(),
                    });
                };
                Ok(Value::Bool(actual.is_empty() || actual == wanted))
            }
            Self::Len => {
                let len = match &arg {
                    Value::Str(text) => text.chars().count(),
                    Value::List(items) => items.len(),
                    Value::Bool(_) | Value::Int(_) => {
                        return Err(EvaluationError::Function {
                            function: "len",
                            message: format!("unsupported argument type {}", arg.value_type()),
                        });
                    }
                };
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            Self::Lower => Ok(Value::Str(Cow::Owned(self.string_arg(&arg)?.to_lowercase()))),
            Self::Upper => Ok(Value::Str(Cow::Owned(self.string_arg(&arg)?.to_uppercase()))),
        }
    }

    /// Extracts a string argument or reports a helper failure.
    fn string_arg<'v>(&self, arg: &'v Value<'_>) -> Result<&'v str, EvaluationError> {
        arg.as_str().ok_or_else(|| EvaluationError::Function {
            function: self.name(),
            message: format!("expected string argument, found {}", arg.value_type()),
        })
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves a helper call and returns its result type.
pub(crate) fn resolve(
    name: &str,
    args: &[ValueType],
    schema: &Schema,
    position: usize,
) -> Result<(Function, ValueType), CompileError> {
    match name {
        APPLIES_TO_ARCHITECTURE => {
            let Some(field) = schema.architecture_field() else {
                return Err(CompileError::FunctionUnavailable {
                    name: APPLIES_TO_ARCHITECTURE,
                    record: schema.name().to_string(),
                    reason: "record has no architecture field",
                });
            };
            expect_arity(APPLIES_TO_ARCHITECTURE, args, 1, position)?;
            expect_arg(APPLIES_TO_ARCHITECTURE, args[0], ValueType::String, position)?;
            Ok((
                Function::AppliesToArchitecture {
                    field: field.into(),
                },
                ValueType::Bool,
            ))
        }
        "len" => {
            expect_arity("len", args, 1, position)?;
            if args[0] == ValueType::String || args[0].is_list() {
                Ok((Function::Len, ValueType::Int))
            } else {
                Err(CompileError::TypeMismatch {
                    message: format!("`len` expects a string or list, found {}", args[0]),
                    position,
                })
            }
        }
        "lower" => {
            expect_arity("lower", args, 1, position)?;
            expect_arg("lower", args[0], ValueType::String, position)?;
            Ok((Function::Lower, ValueType::String))
        }
        "upper" => {
            expect_arity("upper", args, 1, position)?;
            expect_arg("upper", args[0], ValueType::String, position)?;
            Ok((Function::Upper, ValueType::String))
        }
        _ => Err(CompileError::UnknownFunction {
            name: name.to_string(),
            position,
        }),
    }
}

/// Checks the argument count of a helper call.
fn expect_arity(
    name: &'static str,
    args: &[ValueType],
    expected: usize,
    position: usize,
) -> Result<(), CompileError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CompileError::ArityMismatch {
            name,
            expected,
            actual: args.len(),
            position,
        })
    }
}

/// Checks the static type of a helper argument.
fn expect_arg(
    name: &'static str,
    actual: ValueType,
    expected: ValueType,
    position: usize,
) -> Result<(), CompileError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            message: format!("`{name}` expects a {expected} argument, found {actual}"),
            position,
        })
    }
}

/// Validates an architecture name passed to `AppliesToArchitecture`.
fn validate_architecture(arch: &str) -> Result<(), String> {
    if arch.is_empty() {
        return Err("architecture must not be empty".to_string());
    }
    if arch.len() > MAX_ARCHITECTURE_BYTES {
        return Err(format!("architecture exceeds {MAX_ARCHITECTURE_BYTES} bytes"));
    }
    if let Some(bad) =
        arch.chars().find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')))
    {
        return Err(format!("architecture `{arch}` contains invalid character `{bad}`"));
    }
    Ok(())
}
