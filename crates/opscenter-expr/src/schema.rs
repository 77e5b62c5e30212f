// crates/opscenter-expr/src/schema.rs
// ============================================================================
// Module: Record Schemas
// Description: Declared field sets that expressions are compiled against.
// Purpose: Keep the identifier universe of an expression data-driven instead
//          of hard-coding record shapes into the parser.
// Dependencies: crate::value, serde
// ============================================================================

//! ## Overview
//! A [`Schema`] names a record type, lists its fields with their
//! [`ValueType`]s, and optionally designates the field consulted by the
//! `AppliesToArchitecture` helper. Schemas are immutable once built.
//!
//! ```
//! use opscenter_expr::Schema;
//! use opscenter_expr::ValueType;
//!
//! let schema = Schema::builder("Package")
//!     .field("Name", ValueType::String)
//!     .field("Tags", ValueType::StringList)
//!     .architecture_field("Arch")
//!     .build()
//!     .unwrap();
//! assert_eq!(schema.field_type("Tags"), Some(ValueType::StringList));
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::SchemaError;
use crate::value::ValueType;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Declared field set of a record type.
///
/// # Invariants
/// - Field names are valid identifiers and unique.
/// - When present, the architecture field is declared with type `string`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Record type name used in diagnostics.
    name: String,
    /// Field types keyed by field name.
    fields: BTreeMap<String, ValueType>,
    /// Field consulted by `AppliesToArchitecture`.
    #[serde(skip_serializing_if = "Option::is_none")]
    architecture_field: Option<String>,
}

impl Schema {
    /// Starts building a schema for the named record type.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            architecture_field: None,
        }
    }

    /// Returns the record type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type of a field.
    #[must_use]
    pub fn field_type(&self, name: &str) -> Option<ValueType> {
        self.fields.get(name).copied()
    }

    /// Iterates declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, ValueType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Returns the architecture field name, if the record has one.
    #[must_use]
    pub fn architecture_field(&self) -> Option<&str> {
        self.architecture_field.as_deref()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`Schema`]; validation happens in [`SchemaBuilder::build`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    /// Record type name.
    name: String,
    /// Declared fields in insertion order.
    fields: Vec<(String, ValueType)>,
    /// Architecture field name.
    architecture_field: Option<String>,
}

impl SchemaBuilder {
    /// Declares a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Declares the string field consulted by `AppliesToArchitecture`.
    ///
    /// The field is declared as `string` when it was not declared already.
    #[must_use]
    pub fn architecture_field(mut self, name: impl Into<String>) -> Self {
        self.architecture_field = Some(name.into());
        self
    }

    /// Validates and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for invalid or duplicate field names, or when
    /// the architecture field is not a string.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut fields = BTreeMap::new();
        for (name, ty) in self.fields {
            if !is_identifier(&name) {
                return Err(SchemaError::InvalidFieldName(name));
            }
            if fields.insert(name.clone(), ty).is_some() {
                return Err(SchemaError::DuplicateField(name));
            }
        }
        if let Some(arch) = &self.architecture_field {
            if !is_identifier(arch) {
                return Err(SchemaError::InvalidFieldName(arch.clone()));
            }
            match fields.get(arch) {
                Some(ValueType::String) => {}
                Some(other) => {
                    return Err(SchemaError::ArchitectureFieldType {
                        field: arch.clone(),
                        found: *other,
                    });
                }
                None => {
                    fields.insert(arch.clone(), ValueType::String);
                }
            }
        }
        Ok(Schema {
            name: self.name,
            fields,
            architecture_field: self.architecture_field,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `name` lexes as a single identifier and is not a keyword.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return false;
    }
    !crate::dsl::is_keyword(name)
}
