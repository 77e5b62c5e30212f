// crates/opscenter-config/src/lib.rs
// ============================================================================
// Module: Operations Center Config Library
// Description: System configuration model, validation, and versioned store.
// Purpose: Single source of truth for opscenter.toml semantics.
// Dependencies: opscenter-core, serde, toml
// ============================================================================

//! ## Overview
//! `opscenter-config` defines the system configuration sections, loads them
//! from TOML with strict limits, and publishes them through
//! [`SystemConfigStore`], which replaces one section at a time and keeps the
//! compiled updates policy in step with the updates section.
//!
//! Security posture: config inputs are untrusted and validation fails
//! closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
pub use store::SystemConfigStore;
