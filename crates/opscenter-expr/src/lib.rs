// crates/opscenter-expr/src/lib.rs
// ============================================================================
// Module: Expression Root
// Description: Public API surface for the filter expression engine.
// Purpose: Wire together values, schemas, parser, evaluator, and engine traits.
// Dependencies: crate::{dsl, engine, error, expr, functions, schema, value}
// ============================================================================

//! ## Overview
//! A small, statically typed expression language for deciding whether a
//! record is eligible. Expressions are compiled once against a [`Schema`]
//! and evaluated many times against [`Record`] implementations.
//!
//! ```
//! use opscenter_expr::Record;
//! use opscenter_expr::Schema;
//! use opscenter_expr::Value;
//! use opscenter_expr::ValueType;
//! use opscenter_expr::compile;
//!
//! struct Release {
//!     channels: Vec<String>,
//! }
//!
//! impl Record for Release {
//!     fn field(&self, name: &str) -> Option<Value<'_>> {
//!         match name {
//!             "Channels" => Some(Value::string_list(self.channels.iter().map(String::as_str))),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let schema = Schema::builder("Release")
//!     .field("Channels", ValueType::StringList)
//!     .build()
//!     .unwrap();
//! let compiled = compile("'stable' in Channels", &schema).unwrap();
//! let release = Release {
//!     channels: vec!["stable".to_string()],
//! };
//! assert!(compiled.evaluate(&release).unwrap());
//! ```

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod dsl;
pub mod engine;
pub mod error;
mod expr;
pub mod functions;
pub mod schema;
pub mod value;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dsl::MAX_EXPRESSION_BYTES;
pub use dsl::MAX_EXPRESSION_NESTING;
pub use engine::BuiltinEngine;
pub use engine::CompiledExpression;
pub use engine::CompiledPredicate;
pub use engine::ExpressionEngine;
pub use engine::compile;
pub use error::CompileError;
pub use error::EvaluationError;
pub use error::SchemaError;
pub use functions::APPLIES_TO_ARCHITECTURE;
pub use functions::BUILTIN_FUNCTIONS;
pub use schema::Schema;
pub use schema::SchemaBuilder;
pub use value::Record;
pub use value::Value;
pub use value::ValueType;
