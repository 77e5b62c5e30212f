// crates/opscenter-expr/src/expr.rs
// ============================================================================
// Module: Expression Tree
// Description: Typed expression tree produced by the parser and its evaluator.
// Purpose: Evaluate compiled expressions against records with short-circuit
//          connectives and no side effects.
// Dependencies: crate::{error, functions, value}, smallvec
// ============================================================================

//! ## Overview
//! Nodes are type-checked when built, so evaluation only re-validates what a
//! record returns at runtime. `And` and `Or` short-circuit: once the outcome
//! is decided no further operand (and no further helper) is evaluated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;

use smallvec::SmallVec;

use crate::error::EvaluationError;
use crate::functions::Function;
use crate::value::Record;
use crate::value::Value;
use crate::value::ValueType;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Binary comparison and membership operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `contains`
    Contains,
    /// `startsWith`
    StartsWith,
    /// `endsWith`
    EndsWith,
}

impl CompareOp {
    /// Returns the operator as written in expressions.
    pub(crate) const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }
}

// ============================================================================
// SECTION: Expression Nodes
// ============================================================================

/// Literal constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Literal {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// String literal.
    Str(Box<str>),
}

/// Typed expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    /// Constant value.
    Literal(Literal),
    /// Record field reference with its declared type.
    Field {
        /// Field name.
        name: Box<str>,
        /// Declared field type.
        ty: ValueType,
    },
    /// List literal.
    List(Vec<Self>),
    /// Boolean negation.
    Not(Box<Self>),
    /// Conjunction; short-circuits on the first `false`.
    And(SmallVec<[Box<Self>; 4]>),
    /// Disjunction; short-circuits on the first `true`.
    Or(SmallVec<[Box<Self>; 4]>),
    /// Comparison or membership test.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Self>,
        /// Right operand.
        rhs: Box<Self>,
    },
    /// Helper call.
    Call {
        /// Resolved helper.
        function: Function,
        /// Arguments.
        args: Vec<Self>,
    },
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

impl Expr {
    /// Evaluates this node against a record.
    pub(crate) fn eval<'a>(&'a self, record: &'a dyn Record) -> Result<Value<'a>, EvaluationError> {
        match self {
            Self::Literal(literal) => Ok(match literal {
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Int(value) => Value::Int(*value),
                Literal::Str(value) => Value::Str(Cow::Borrowed(&**value)),
            }),
            Self::Field {
                name,
                ty,
            } => {
                let value = record.field(name).ok_or_else(|| EvaluationError::MissingField {
                    field: name.to_string(),
                })?;
                let actual = value.value_type();
                if ty.accepts(actual) {
                    Ok(value)
                } else {
                    Err(EvaluationError::FieldTypeMismatch {
                        field: name.to_string(),
                        expected: *ty,
                        actual,
                    })
                }
            }
            Self::List(items) => {
                let values = items
                    .iter()
                    .map(|item| item.eval(record))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            Self::Not(inner) => Ok(Value::Bool(!inner.eval_bool(record)?)),
            Self::And(parts) => {
                for part in parts {
                    if !part.eval_bool(record)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Self::Or(parts) => {
                for part in parts {
                    if part.eval_bool(record)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Self::Compare {
                op,
                lhs,
                rhs,
            } => {
                let lhs = lhs.eval(record)?;
                let rhs = rhs.eval(record)?;
                compare(*op, &lhs, &rhs).map(Value::Bool)
            }
            Self::Call {
                function,
                args,
            } => {
                let values =
                    args.iter().map(|arg| arg.eval(record)).collect::<Result<Vec<_>, _>>()?;
                function.call(values, record)
            }
        }
    }

    /// Evaluates this node and requires a boolean result.
    pub(crate) fn eval_bool(&self, record: &dyn Record) -> Result<bool, EvaluationError> {
        let value = self.eval(record)?;
        value.as_bool().ok_or_else(|| EvaluationError::NotBoolean {
            found: value.value_type(),
        })
    }
}

/// Applies a comparison operator to two evaluated operands.
fn compare(op: CompareOp, lhs: &Value<'_>, rhs: &Value<'_>) -> Result<bool, EvaluationError> {
    let mismatch = || EvaluationError::OperandMismatch {
        operator: op.symbol(),
        lhs: lhs.value_type(),
        rhs: rhs.value_type(),
    };
    match op {
        CompareOp::Eq => Ok(lhs == rhs),
        CompareOp::Ne => Ok(lhs != rhs),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => return Err(mismatch()),
            };
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        CompareOp::In | CompareOp::NotIn => {
            let items = rhs.as_list().ok_or_else(mismatch)?;
            let found = items.iter().any(|item| item == lhs);
            Ok(if op == CompareOp::In { found } else { !found })
        }
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let (Some(haystack), Some(needle)) = (lhs.as_str(), rhs.as_str()) else {
                return Err(mismatch());
            };
            Ok(match op {
                CompareOp::Contains => haystack.contains(needle),
                CompareOp::StartsWith => haystack.starts_with(needle),
                _ => haystack.ends_with(needle),
            })
        }
    }
}
