// crates/opscenter-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation and store tests.
// Purpose: Reduce duplication across integration tests for opscenter-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::sync::Mutex;
use std::sync::PoisonError;

use opscenter_config::ConfigError;
use opscenter_config::OpsCenterConfig;
use opscenter_core::EvaluationFailureEvent;
use opscenter_core::FilterAuditSink;
use opscenter_core::PolicyChangeEvent;
use rcgen::BasicConstraints;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::IsCa;
use rcgen::KeyPair;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into an `OpsCenterConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<OpsCenterConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<OpsCenterConfig, toml::de::Error> {
    config_from_toml("")
}

/// Asserts that a validation result is an error containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

/// PEM material for a generated self-signed CA.
pub struct GeneratedCert {
    /// Certificate PEM.
    pub cert_pem: String,
    /// Private key PEM.
    pub key_pem: String,
}

/// Generates a self-signed CA certificate and key.
pub fn generate_ca(common_name: &str) -> Result<GeneratedCert, String> {
    let key = KeyPair::generate().map_err(|err| err.to_string())?;
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;
    let cert = params.self_signed(&key).map_err(|err| err.to_string())?;
    Ok(GeneratedCert {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

/// Audit sink that keeps policy change events in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Policy change events.
    changes: Mutex<Vec<PolicyChangeEvent>>,
    /// Number of evaluation failure events.
    failures: Mutex<usize>,
}

impl RecordingSink {
    /// Returns recorded policy changes as `(section, published)` pairs.
    pub fn changes(&self) -> Vec<(&'static str, bool)> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| (event.section, event.error.is_none()))
            .collect()
    }

    /// Returns the number of evaluation failures recorded.
    pub fn failure_count(&self) -> usize {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FilterAuditSink for RecordingSink {
    fn record_evaluation_failure(&self, _event: &EvaluationFailureEvent) {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn record_policy_change(&self, event: &PolicyChangeEvent) {
        self.changes.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}
