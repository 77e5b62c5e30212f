// crates/opscenter-config/src/config.rs
// ============================================================================
// Module: Operations Center Configuration
// Description: System configuration records, loading, and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: opscenter-core, opscenter-expr, rustls-pki-types, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits
//! and covers four independently replaceable sections: the system
//! certificate, network binding, security settings, and update sourcing and
//! filtering. Missing or invalid configuration fails closed.
//!
//! Security posture: config inputs are untrusted. Private keys and API
//! tokens are redacted from `Debug` output and never appear in errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use opscenter_core::UpdatesPolicy;
use opscenter_core::UpdatesPolicyInput;
use opscenter_expr::BuiltinEngine;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::PrivateKeyDer;
use rustls_pki_types::pem::PemObject;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "opscenter.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "OPSCENTER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of trusted client fingerprints.
pub(crate) const MAX_TRUSTED_FINGERPRINTS: usize = 1024;
/// Length of a hex-encoded SHA-256 fingerprint.
const FINGERPRINT_HEX_LENGTH: usize = 64;
/// Default REST API bind address.
pub(crate) const DEFAULT_REST_SERVER_ADDRESS: &str = "[::]:7443";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Operations Center system configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsCenterConfig {
    /// Server certificate and key.
    #[serde(default)]
    pub certificate: SystemCertificate,
    /// Network configuration.
    #[serde(default)]
    pub network: SystemNetworkConfig,
    /// Security configuration.
    #[serde(default)]
    pub security: SystemSecurityConfig,
    /// Updates configuration.
    #[serde(default)]
    pub updates: SystemUpdatesConfig,
    /// Audit log configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl OpsCenterConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section and normalizes fingerprints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.certificate.validate()?;
        self.network.validate()?;
        self.security.validate()?;
        self.updates.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Server certificate and key (PEM).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemCertificate {
    /// X.509 certificate chain (PEM).
    #[serde(default)]
    pub certificate: String,
    /// Private key (PEM).
    #[serde(default)]
    pub key: String,
}

impl SystemCertificate {
    /// Validates certificate and key PEM structure.
    ///
    /// Both may be empty when no certificate has been provisioned yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when only one of the pair is set or either
    /// does not hold the expected PEM block.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_cert = !self.certificate.trim().is_empty();
        let has_key = !self.key.trim().is_empty();
        match (has_cert, has_key) {
            (false, false) => return Ok(()),
            (true, false) => {
                return Err(ConfigError::Invalid(
                    "certificate.key must be set when certificate.certificate is set".to_string(),
                ));
            }
            (false, true) => {
                return Err(ConfigError::Invalid(
                    "certificate.certificate must be set when certificate.key is set".to_string(),
                ));
            }
            (true, true) => {}
        }

        let mut certificates = 0_usize;
        for cert in CertificateDer::pem_slice_iter(self.certificate.as_bytes()) {
            cert.map_err(|_| {
                ConfigError::Invalid(
                    "certificate.certificate contains a malformed PEM block".to_string(),
                )
            })?;
            certificates += 1;
        }
        if certificates == 0 {
            return Err(ConfigError::Invalid(
                "certificate.certificate must contain a PEM CERTIFICATE block".to_string(),
            ));
        }
        PrivateKeyDer::from_pem_slice(self.key.as_bytes()).map_err(|_| {
            ConfigError::Invalid("certificate.key must contain a PEM private key".to_string())
        })?;
        Ok(())
    }
}

impl fmt::Debug for SystemCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemCertificate")
            .field("certificate_bytes", &self.certificate.len())
            .field("key", &redacted(&self.key))
            .finish()
    }
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNetworkConfig {
    /// Address managed servers use to reach Operations Center.
    #[serde(default, rename = "address")]
    pub operations_center_address: String,
    /// Address and port the REST API binds to.
    #[serde(default = "default_rest_server_address")]
    pub rest_server_address: String,
}

impl Default for SystemNetworkConfig {
    fn default() -> Self {
        Self {
            operations_center_address: String::new(),
            rest_server_address: default_rest_server_address(),
        }
    }
}

impl SystemNetworkConfig {
    /// Validates addresses.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address does not parse or the
    /// public address is not an http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address()?;
        validate_http_url("network.address", &self.operations_center_address)?;
        Ok(())
    }

    /// Returns the parsed REST API bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address does not parse.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.rest_server_address.trim().parse().map_err(|_| {
            ConfigError::Invalid(
                "network.rest_server_address must be a valid socket address".to_string(),
            )
        })
    }
}

/// Security configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSecurityConfig {
    /// OIDC settings.
    #[serde(default)]
    pub oidc: OidcConfig,
    /// OpenFGA settings.
    #[serde(default)]
    pub openfga: OpenFgaConfig,
    /// SHA-256 fingerprints of trusted TLS client certificates.
    #[serde(default)]
    pub trusted_tls_client_cert_fingerprints: Vec<String>,
}

impl SystemSecurityConfig {
    /// Validates settings and lowercases fingerprints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a URL is malformed, a fingerprint is not
    /// 64 hex digits, or a fingerprint repeats (case-insensitive).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.oidc.validate()?;
        self.openfga.validate()?;
        if self.trusted_tls_client_cert_fingerprints.len() > MAX_TRUSTED_FINGERPRINTS {
            return Err(ConfigError::Invalid(format!(
                "security.trusted_tls_client_cert_fingerprints exceeds {MAX_TRUSTED_FINGERPRINTS} \
                 entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for (index, fingerprint) in self.trusted_tls_client_cert_fingerprints.iter_mut().enumerate()
        {
            let normalized = fingerprint.trim().to_ascii_lowercase();
            if normalized.len() != FINGERPRINT_HEX_LENGTH
                || !normalized.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(ConfigError::Invalid(format!(
                    "security.trusted_tls_client_cert_fingerprints[{index}] must be a sha-256 hex \
                     fingerprint"
                )));
            }
            if !seen.insert(normalized.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "security.trusted_tls_client_cert_fingerprints[{index}] is a duplicate"
                )));
            }
            *fingerprint = normalized;
        }
        Ok(())
    }

    /// Returns true when `fingerprint` is trusted (case-insensitive).
    #[must_use]
    pub fn is_trusted_fingerprint(&self, fingerprint: &str) -> bool {
        self.trusted_tls_client_cert_fingerprints
            .iter()
            .any(|trusted| trusted.eq_ignore_ascii_case(fingerprint.trim()))
    }
}

/// OIDC settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Issuer URL.
    #[serde(default)]
    pub issuer: String,
    /// Client id registered with the issuer.
    #[serde(default)]
    pub client_id: String,
    /// Scopes to request.
    #[serde(default)]
    pub scopes: String,
    /// Audience tokens are verified against.
    #[serde(default)]
    pub audience: String,
    /// Claim identifying the subject.
    #[serde(default)]
    pub claim: String,
}

impl OidcConfig {
    /// Returns true when OIDC is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.issuer.trim().is_empty()
    }

    /// Validates the issuer and client id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the issuer is not a URL or the client id
    /// is missing for a configured issuer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("security.oidc.issuer", &self.issuer)?;
        if self.is_enabled() && self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "security.oidc.client_id must be set when issuer is set".to_string(),
            ));
        }
        Ok(())
    }
}

/// OpenFGA settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFgaConfig {
    /// API token.
    #[serde(default)]
    pub api_token: String,
    /// API URL.
    #[serde(default)]
    pub api_url: String,
    /// Store id.
    #[serde(default)]
    pub store_id: String,
}

impl OpenFgaConfig {
    /// Returns true when OpenFGA is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.api_url.trim().is_empty()
    }

    /// Validates the API URL and required companions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL is malformed or the store id or
    /// token is missing for a configured URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("security.openfga.api_url", &self.api_url)?;
        if self.is_enabled() {
            if self.api_token.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "security.openfga.api_token must be set when api_url is set".to_string(),
                ));
            }
            if self.store_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "security.openfga.store_id must be set when api_url is set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for OpenFgaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFgaConfig")
            .field("api_token", &redacted(&self.api_token))
            .field("api_url", &self.api_url)
            .field("store_id", &self.store_id)
            .finish()
    }
}

/// Updates sourcing and filtering configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemUpdatesConfig {
    /// URL updates are fetched from.
    #[serde(default)]
    pub source: String,
    /// Root CA (PEM) verifying update manifest signatures.
    #[serde(default)]
    pub signature_verification_root_ca: String,
    /// Update-level filter expression; empty accepts every update.
    #[serde(default)]
    pub filter_expression: String,
    /// File-level filter expression; empty accepts every file.
    #[serde(default)]
    pub file_filter_expression: String,
}

impl SystemUpdatesConfig {
    /// Returns the policy input borrowed from this section.
    #[must_use]
    pub fn policy_input(&self) -> UpdatesPolicyInput<'_> {
        UpdatesPolicyInput {
            source: &self.source,
            signature_verification_root_ca: &self.signature_verification_root_ca,
            filter_expression: &self.filter_expression,
            file_filter_expression: &self.file_filter_expression,
        }
    }

    /// Validates the source URL, both expressions, and the root CA.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the source is not an http(s) URL or the
    /// policy does not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_source()?;
        UpdatesPolicy::compile(&BuiltinEngine, &self.policy_input())
            .map_err(|err| ConfigError::Invalid(format!("updates: {err}")))?;
        Ok(())
    }

    /// Validates only the source URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the source is not an http(s) URL.
    pub fn validate_source(&self) -> Result<(), ConfigError> {
        validate_http_url("updates.source", &self.source)
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only JSON-lines audit log path; stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates the audit log path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path is empty or exceeds limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an optional URL of any scheme.
fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    Url::parse(trimmed)
        .map(|_| ())
        .map_err(|_| ConfigError::Invalid(format!("{field} must be a valid url")))
}

/// Validates an optional URL that must use http or https.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let url = Url::parse(trimmed)
        .map_err(|_| ConfigError::Invalid(format!("{field} must be a valid url")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must be an http or https url")));
    }
    Ok(())
}

/// Returns a redaction marker for secret values.
const fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "<redacted>" }
}

/// Default REST API bind address.
pub(crate) fn default_rest_server_address() -> String {
    DEFAULT_REST_SERVER_ADDRESS.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
