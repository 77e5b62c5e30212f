// crates/opscenter-expr/src/value.rs
// ============================================================================
// Module: Expression Values
// Description: Static value types, runtime values, and the record contract.
// Purpose: Give the parser a type lattice and the evaluator a borrowed value
//          model that records can produce without cloning.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! Records expose named fields as [`Value`]s. Every field is declared with a
//! [`ValueType`] in a [`Schema`](crate::schema::Schema); the parser checks
//! operand types against those declarations and the evaluator re-checks the
//! values a record actually returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Value Types
// ============================================================================

/// Static type of an expression operand or record field.
///
/// # Invariants
/// - `EmptyList` only describes list literals without elements; it is
///   compatible with every list type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// UTF-8 string.
    String,
    /// List of strings.
    StringList,
    /// List of integers.
    IntList,
    /// List literal without elements.
    EmptyList,
}

impl ValueType {
    /// Returns a stable label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::StringList => "list<string>",
            Self::IntList => "list<int>",
            Self::EmptyList => "list<empty>",
        }
    }

    /// Returns true for list types.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::StringList | Self::IntList | Self::EmptyList)
    }

    /// Returns true for scalar types that may appear inside a list.
    #[must_use]
    pub const fn is_list_element(self) -> bool {
        matches!(self, Self::String | Self::Int)
    }

    /// Returns the element type of a list type.
    #[must_use]
    pub const fn element(self) -> Option<Self> {
        match self {
            Self::StringList => Some(Self::String),
            Self::IntList => Some(Self::Int),
            Self::Bool | Self::Int | Self::String | Self::EmptyList => None,
        }
    }

    /// Returns the list type holding elements of this type.
    #[must_use]
    pub const fn list_of(self) -> Option<Self> {
        match self {
            Self::String => Some(Self::StringList),
            Self::Int => Some(Self::IntList),
            Self::Bool | Self::StringList | Self::IntList | Self::EmptyList => None,
        }
    }

    /// Returns true when values of the two types can be compared for equality.
    #[must_use]
    pub fn is_compatible(self, other: Self) -> bool {
        if self == other {
            return true;
        }
        (self == Self::EmptyList && other.is_list()) || (other == Self::EmptyList && self.is_list())
    }

    /// Returns true when a runtime value of type `actual` satisfies a field
    /// declared with this type.
    #[must_use]
    pub fn accepts(self, actual: Self) -> bool {
        self == actual || (self.is_list() && actual == Self::EmptyList)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Runtime Values
// ============================================================================

/// Runtime value produced by records, literals, and operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// String value, borrowed from the record or literal when possible.
    Str(Cow<'a, str>),
    /// List of scalar values.
    List(Vec<Self>),
}

impl<'a> Value<'a> {
    /// Returns the dynamic type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::String,
            Self::List(items) => match items.first() {
                None => ValueType::EmptyList,
                Some(Self::Int(_)) => ValueType::IntList,
                Some(_) => ValueType::StringList,
            },
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    /// Returns the list payload, if any.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Builds a string list borrowing each element.
    #[must_use]
    pub fn string_list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::List(items.into_iter().map(|item| Self::Str(Cow::Borrowed(item))).collect())
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value<'_> {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(value: &'a str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for Value<'_> {
    fn from(value: String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

// ============================================================================
// SECTION: Record Contract
// ============================================================================

/// A typed record that filter expressions evaluate against.
///
/// Implementations return `None` only for names they do not know. Unset
/// optional strings are returned as the empty string.
pub trait Record {
    /// Returns the value of the named field.
    fn field(&self, name: &str) -> Option<Value<'_>>;
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Option<Value<'_>> {
        (**self).field(name)
    }
}
