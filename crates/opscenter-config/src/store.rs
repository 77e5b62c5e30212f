// crates/opscenter-config/src/store.rs
// ============================================================================
// Module: System Configuration Store
// Description: Versioned, copy-on-write holder of the four config sections.
// Purpose: Apply PUT-style replacements fail-closed and expose snapshots.
// Dependencies: crate::config, opscenter-core, opscenter-expr
// ============================================================================

//! ## Overview
//! [`SystemConfigStore`] owns one [`Published`] cell per configuration
//! section plus the compiled [`UpdatesPolicyCell`]. Every `replace_*` call
//! validates the complete new section before publishing it; a rejected
//! request leaves the active section (and its version) untouched and is
//! reported to the audit sink.
//!
//! The updates section and the compiled policy are replaced together under
//! a writer lock, so the published section always matches the active policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use opscenter_core::ConfigVersion;
use opscenter_core::FilterAuditSink;
use opscenter_core::FilterOutcome;
use opscenter_core::PolicyChangeEvent;
use opscenter_core::PolicyError;
use opscenter_core::PolicyState;
use opscenter_core::Published;
use opscenter_core::RecordSchemas;
use opscenter_core::Snapshot;
use opscenter_core::Update;
use opscenter_core::UpdatesPolicy;
use opscenter_core::UpdatesPolicyCell;
use opscenter_expr::BuiltinEngine;
use opscenter_expr::ExpressionEngine;

use crate::config::ConfigError;
use crate::config::OpsCenterConfig;
use crate::config::SystemCertificate;
use crate::config::SystemNetworkConfig;
use crate::config::SystemSecurityConfig;
use crate::config::SystemUpdatesConfig;

// ============================================================================
// SECTION: Section Names
// ============================================================================

/// Audit section name for certificate changes.
const SECTION_CERTIFICATE: &str = "certificate";
/// Audit section name for network changes.
const SECTION_NETWORK: &str = "network";
/// Audit section name for security changes.
const SECTION_SECURITY: &str = "security";

// ============================================================================
// SECTION: Store
// ============================================================================

/// Versioned system configuration with fail-closed replacement.
pub struct SystemConfigStore {
    /// Server certificate section.
    certificate: Published<SystemCertificate>,
    /// Network section.
    network: Published<SystemNetworkConfig>,
    /// Security section.
    security: Published<SystemSecurityConfig>,
    /// Updates section.
    updates: Published<SystemUpdatesConfig>,
    /// Compiled updates policy.
    policy: UpdatesPolicyCell,
    /// Audit sink for policy changes and filter failures.
    sink: Arc<dyn FilterAuditSink>,
    /// Serializes updates writers so section and policy stay paired.
    updates_writer: Mutex<()>,
}

impl SystemConfigStore {
    /// Builds a store from `config` using the built-in expression engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` is invalid.
    pub fn new(
        config: OpsCenterConfig,
        sink: Arc<dyn FilterAuditSink>,
    ) -> Result<Self, ConfigError> {
        let schemas = RecordSchemas::builtin()
            .map_err(|err| ConfigError::Invalid(format!("updates: {err}")))?;
        Self::with_engine(config, Arc::new(BuiltinEngine), schemas, sink)
    }

    /// Builds a store from `config` with a caller-supplied engine and schemas.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` is invalid.
    pub fn with_engine(
        mut config: OpsCenterConfig,
        engine: Arc<dyn ExpressionEngine>,
        schemas: RecordSchemas,
        sink: Arc<dyn FilterAuditSink>,
    ) -> Result<Self, ConfigError> {
        config.certificate.validate()?;
        config.network.validate()?;
        config.security.validate()?;
        config.updates.validate_source()?;
        config.audit.validate()?;

        let policy = UpdatesPolicyCell::new(engine, schemas);
        policy
            .replace(&config.updates.policy_input(), sink.as_ref())
            .map_err(|err| ConfigError::Invalid(format!("updates: {err}")))?;

        Ok(Self {
            certificate: Published::new(config.certificate),
            network: Published::new(config.network),
            security: Published::new(config.security),
            updates: Published::new(config.updates),
            policy,
            sink,
            updates_writer: Mutex::new(()),
        })
    }

    // ------------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------------

    /// Returns the active certificate section.
    #[must_use]
    pub fn certificate(&self) -> Snapshot<SystemCertificate> {
        self.certificate.snapshot()
    }

    /// Returns the active network section.
    #[must_use]
    pub fn network(&self) -> Snapshot<SystemNetworkConfig> {
        self.network.snapshot()
    }

    /// Returns the active security section.
    #[must_use]
    pub fn security(&self) -> Snapshot<SystemSecurityConfig> {
        self.security.snapshot()
    }

    /// Returns the active updates section.
    #[must_use]
    pub fn updates(&self) -> Snapshot<SystemUpdatesConfig> {
        self.updates.snapshot()
    }

    /// Returns the active compiled updates policy.
    ///
    /// A store always holds a policy once constructed; the accept-all policy
    /// is only returned if the cell was never populated.
    #[must_use]
    pub fn policy(&self) -> Arc<UpdatesPolicy> {
        self.policy
            .current()
            .map_or_else(|| Arc::new(UpdatesPolicy::accept_all()), |snapshot| snapshot.value)
    }

    /// Returns the state of the compiled updates policy.
    #[must_use]
    pub fn policy_state(&self) -> PolicyState {
        self.policy.state()
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit_sink(&self) -> &dyn FilterAuditSink {
        self.sink.as_ref()
    }

    // ------------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------------

    /// Replaces the certificate section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the new section is invalid.
    pub fn replace_certificate(
        &self,
        certificate: SystemCertificate,
    ) -> Result<ConfigVersion, ConfigError> {
        self.replace_section(&self.certificate, SECTION_CERTIFICATE, move || {
            certificate.validate()?;
            Ok(certificate)
        })
    }

    /// Replaces the network section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an address does not parse.
    pub fn replace_network(
        &self,
        network: SystemNetworkConfig,
    ) -> Result<ConfigVersion, ConfigError> {
        self.replace_section(&self.network, SECTION_NETWORK, move || {
            network.validate()?;
            Ok(network)
        })
    }

    /// Replaces the security section; fingerprints are stored lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the new section is invalid.
    pub fn replace_security(
        &self,
        mut security: SystemSecurityConfig,
    ) -> Result<ConfigVersion, ConfigError> {
        self.replace_section(&self.security, SECTION_SECURITY, move || {
            security.validate()?;
            Ok(security)
        })
    }

    /// Replaces the updates section and recompiles the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the source is malformed, an expression
    /// does not compile, or the root CA cannot be loaded. The previous
    /// section and policy stay active.
    pub fn replace_updates(
        &self,
        updates: SystemUpdatesConfig,
    ) -> Result<ConfigVersion, ConfigError> {
        let _writer = self.updates_writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = updates.validate_source() {
            let detail = match &err {
                ConfigError::Invalid(message) => message.clone(),
                other => other.to_string(),
            };
            self.policy.reject(PolicyError::Source(detail), self.sink.as_ref());
            return Err(err);
        }
        self.policy
            .replace(&updates.policy_input(), self.sink.as_ref())
            .map_err(|err| ConfigError::Invalid(format!("updates: {err}")))?;
        Ok(self.updates.replace(updates))
    }

    /// Filters `updates` with the active policy.
    #[must_use]
    pub fn filter_updates(&self, updates: Vec<Update>) -> FilterOutcome<Update> {
        self.policy().filter_updates(updates, self.sink.as_ref())
    }

    /// Validates and publishes one section, auditing the outcome.
    fn replace_section<T>(
        &self,
        cell: &Published<T>,
        section: &'static str,
        build: impl FnOnce() -> Result<T, ConfigError>,
    ) -> Result<ConfigVersion, ConfigError> {
        match cell.try_update(|_| build()) {
            Ok(version) => {
                self.sink.record_policy_change(&PolicyChangeEvent::published(section, version.get()));
                Ok(version)
            }
            Err(err) => {
                self.sink.record_policy_change(&PolicyChangeEvent::rejected(
                    section,
                    Some(cell.version().get()),
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }
}

impl fmt::Debug for SystemConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemConfigStore")
            .field("certificate", &self.certificate.version())
            .field("network", &self.network.version())
            .field("security", &self.security.version())
            .field("updates", &self.updates.version())
            .field("policy", &self.policy.state())
            .finish_non_exhaustive()
    }
}
