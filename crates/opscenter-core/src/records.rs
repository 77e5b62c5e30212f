// crates/opscenter-core/src/records.rs
// ============================================================================
// Module: Update Records
// Description: Update and update file descriptors plus their expression schemas.
// Purpose: Expose provisioning records to filter expressions by field name.
// Dependencies: opscenter-expr, serde
// ============================================================================

//! ## Overview
//! [`Update`] and [`UpdateFile`] are produced by a provisioning source and
//! handed to the filters. Both implement [`Record`] so compiled expressions
//! can read their fields by the PascalCase names listed in
//! [`UPDATE_FIELDS`] and [`UPDATE_FILE_FIELDS`]. An unset architecture reads
//! as the empty string.
//!
//! The identifier universe is data-driven: [`RecordSchemas::builtin`] builds
//! schemas from the field tables, and callers that expose additional record
//! fields can supply their own schemas instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use opscenter_expr::Record;
use opscenter_expr::Schema;
use opscenter_expr::SchemaError;
use opscenter_expr::Value;
use opscenter_expr::ValueType;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Field Tables
// ============================================================================

/// Name of the architecture field shared by both record types.
pub const ARCHITECTURE_FIELD: &str = "Architecture";

/// Expression-visible fields of [`Update`].
pub const UPDATE_FIELDS: &[(&str, ValueType)] = &[
    ("ID", ValueType::String),
    ("Origin", ValueType::String),
    ("ExternalID", ValueType::String),
    ("Version", ValueType::String),
    ("PublishedAt", ValueType::String),
    ("Severity", ValueType::String),
    ("Status", ValueType::String),
    ("URL", ValueType::String),
    ("Channels", ValueType::StringList),
    (ARCHITECTURE_FIELD, ValueType::String),
];

/// Expression-visible fields of [`UpdateFile`].
pub const UPDATE_FILE_FIELDS: &[(&str, ValueType)] = &[
    ("Filename", ValueType::String),
    ("URL", ValueType::String),
    ("Sha256", ValueType::String),
    ("Component", ValueType::String),
    ("Type", ValueType::String),
    ("Size", ValueType::Int),
    (ARCHITECTURE_FIELD, ValueType::String),
];

// ============================================================================
// SECTION: Records
// ============================================================================

/// A distributable software release descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Update {
    /// Unique identifier assigned by Operations Center.
    pub id: String,
    /// Provisioning source the update came from.
    pub origin: String,
    /// Identifier of the update at its origin.
    pub external_id: String,
    /// Release version.
    pub version: String,
    /// Publication timestamp (RFC 3339).
    pub published_at: String,
    /// Severity label.
    pub severity: String,
    /// Lifecycle status label.
    pub status: String,
    /// Channels the update is published to.
    pub channels: Vec<String>,
    /// Target architecture; `None` applies to every architecture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Location of the update manifest.
    pub url: String,
    /// Human-readable changelog.
    pub changelog: String,
    /// Artifacts belonging to the update.
    pub files: Vec<UpdateFile>,
}

/// A single artifact belonging to an [`Update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateFile {
    /// File name.
    pub filename: String,
    /// Download location.
    pub url: String,
    /// Size in bytes.
    pub size: i64,
    /// Hex-encoded SHA-256 digest.
    pub sha256: String,
    /// Component the file belongs to.
    pub component: String,
    /// File type label.
    #[serde(rename = "type")]
    pub file_type: String,
    /// Target architecture; `None` applies to every architecture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

impl Record for Update {
    fn field(&self, name: &str) -> Option<Value<'_>> {
        Some(match name {
            "ID" => Value::from(self.id.as_str()),
            "Origin" => Value::from(self.origin.as_str()),
            "ExternalID" => Value::from(self.external_id.as_str()),
            "Version" => Value::from(self.version.as_str()),
            "PublishedAt" => Value::from(self.published_at.as_str()),
            "Severity" => Value::from(self.severity.as_str()),
            "Status" => Value::from(self.status.as_str()),
            "URL" => Value::from(self.url.as_str()),
            "Channels" => Value::string_list(self.channels.iter().map(String::as_str)),
            ARCHITECTURE_FIELD => Value::from(self.architecture.as_deref().unwrap_or_default()),
            _ => return None,
        })
    }
}

impl Record for UpdateFile {
    fn field(&self, name: &str) -> Option<Value<'_>> {
        Some(match name {
            "Filename" => Value::from(self.filename.as_str()),
            "URL" => Value::from(self.url.as_str()),
            "Sha256" => Value::from(self.sha256.as_str()),
            "Component" => Value::from(self.component.as_str()),
            "Type" => Value::from(self.file_type.as_str()),
            "Size" => Value::Int(self.size),
            ARCHITECTURE_FIELD => Value::from(self.architecture.as_deref().unwrap_or_default()),
            _ => return None,
        })
    }
}

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Schemas the update and file expressions are compiled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchemas {
    /// Schema for update-level expressions.
    pub update: Schema,
    /// Schema for file-level expressions.
    pub file: Schema,
}

impl RecordSchemas {
    /// Builds the schemas for the built-in record field tables.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a field table is malformed.
    pub fn builtin() -> Result<Self, SchemaError> {
        Ok(Self {
            update: schema_from_table("Update", UPDATE_FIELDS)?,
            file: schema_from_table("UpdateFile", UPDATE_FILE_FIELDS)?,
        })
    }
}

/// Builds a schema from a field table, designating the architecture field.
///
/// # Errors
///
/// Returns [`SchemaError`] when a field name is invalid or repeated.
pub fn schema_from_table(name: &str, fields: &[(&str, ValueType)]) -> Result<Schema, SchemaError> {
    let mut builder = Schema::builder(name);
    for (field, ty) in fields {
        builder = builder.field(*field, *ty);
    }
    if fields.iter().any(|(field, _)| *field == ARCHITECTURE_FIELD) {
        builder = builder.architecture_field(ARCHITECTURE_FIELD);
    }
    builder.build()
}
