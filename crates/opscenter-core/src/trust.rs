// crates/opscenter-core/src/trust.rs
// ============================================================================
// Module: Trust Anchor Loader
// Description: Parse the update signature root CA into a trust anchor.
// Purpose: Hand a validated root certificate to the external manifest verifier.
// Dependencies: rustls, rustls-pki-types, sha2
// ============================================================================

//! ## Overview
//! The signature verification root CA arrives as PEM text in the updates
//! configuration. [`TrustAnchor::from_pem`] accepts exactly one
//! `CERTIFICATE` block that webpki can use as a trust anchor and exposes its
//! DER, a [`RootCertStore`], and its SHA-256 fingerprint. No signature
//! verification happens here.
//!
//! Security posture: the PEM text is operator input and untrusted until it
//! parses. Anything other than a single certificate (keys, bundles, blocks
//! with labels the PEM reader does not recognize) is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::pem::SectionKind;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted PEM text size in bytes.
pub const MAX_TRUST_ANCHOR_PEM_BYTES: usize = 64 * 1024;

/// Prefix of every PEM begin marker.
const PEM_BEGIN: &str = "-----BEGIN ";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustAnchorError {
    /// Verification is required but no certificate was configured.
    #[error("signature verification root ca is required")]
    Missing,
    /// PEM text exceeds the size limit.
    #[error("root ca pem exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
    /// PEM text could not be decoded.
    #[error("invalid root ca pem: {0}")]
    InvalidPem(String),
    /// PEM text held no blocks at all.
    #[error("root ca pem contains no certificate")]
    NoCertificate,
    /// PEM text held more than one block.
    #[error("root ca pem must contain exactly one certificate, found {0} blocks")]
    MultipleBlocks(usize),
    /// The single block is not a certificate.
    #[error("root ca pem block is {0}, expected CERTIFICATE")]
    UnexpectedBlock(String),
    /// The certificate is not usable as a trust anchor.
    #[error("root ca is not a usable trust anchor: {0}")]
    InvalidCertificate(String),
}

// ============================================================================
// SECTION: Requirement
// ============================================================================

/// Whether a trust anchor must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureRequirement {
    /// An empty PEM is an error.
    Required,
    /// An empty PEM yields no anchor.
    Optional,
}

impl SignatureRequirement {
    /// Signature verification is required whenever an update source is set.
    #[must_use]
    pub fn for_source(source: &str) -> Self {
        if source.trim().is_empty() { Self::Optional } else { Self::Required }
    }
}

// ============================================================================
// SECTION: Trust Anchor
// ============================================================================

/// A parsed root certificate for update manifest verification.
#[derive(Clone)]
pub struct TrustAnchor {
    /// Certificate DER.
    der: CertificateDer<'static>,
    /// Root store holding only this certificate.
    roots: RootCertStore,
    /// Lowercase hex SHA-256 of the DER.
    fingerprint: String,
}

impl TrustAnchor {
    /// Parses a single PEM `CERTIFICATE` block.
    ///
    /// # Errors
    ///
    /// Returns [`TrustAnchorError`] when the text is empty, oversized, not
    /// PEM, holds anything but exactly one certificate, or the certificate
    /// cannot serve as a webpki trust anchor.
    pub fn from_pem(pem: &str) -> Result<Self, TrustAnchorError> {
        if pem.len() > MAX_TRUST_ANCHOR_PEM_BYTES {
            return Err(TrustAnchorError::TooLarge {
                max_bytes: MAX_TRUST_ANCHOR_PEM_BYTES,
                actual_bytes: pem.len(),
            });
        }
        let mut sections = Vec::new();
        for section in <(SectionKind, Vec<u8>) as PemObject>::pem_slice_iter(pem.as_bytes()) {
            sections.push(section.map_err(|err| TrustAnchorError::InvalidPem(err.to_string()))?);
        }
        // The PEM reader skips blocks with unrecognized labels; count markers
        // so those still make the input invalid.
        let blocks = pem.matches(PEM_BEGIN).count().max(sections.len());
        let (kind, der) = match (blocks, sections.pop()) {
            (0, _) => return Err(TrustAnchorError::NoCertificate),
            (1, Some(section)) => section,
            (1, None) => return Err(TrustAnchorError::UnexpectedBlock(begin_label(pem))),
            (count, _) => return Err(TrustAnchorError::MultipleBlocks(count)),
        };
        if kind != SectionKind::Certificate {
            return Err(TrustAnchorError::UnexpectedBlock(section_label(kind)));
        }

        let der = CertificateDer::from(der);
        let mut roots = RootCertStore::empty();
        roots
            .add(der.clone())
            .map_err(|err| TrustAnchorError::InvalidCertificate(err.to_string()))?;
        let fingerprint = hex_encode(&Sha256::digest(der.as_ref()));
        Ok(Self {
            der,
            roots,
            fingerprint,
        })
    }

    /// Returns the certificate DER.
    #[must_use]
    pub const fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    /// Returns a root store holding only this certificate.
    #[must_use]
    pub const fn root_store(&self) -> &RootCertStore {
        &self.roots
    }

    /// Returns the lowercase hex SHA-256 fingerprint of the DER.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor").field("fingerprint", &self.fingerprint).finish_non_exhaustive()
    }
}

impl PartialEq for TrustAnchor {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for TrustAnchor {}

/// Loads the configured root CA according to `requirement`.
///
/// # Errors
///
/// Returns [`TrustAnchorError::Missing`] when a required PEM is empty, or
/// any error of [`TrustAnchor::from_pem`].
pub fn load_trust_anchor(
    pem: &str,
    requirement: SignatureRequirement,
) -> Result<Option<TrustAnchor>, TrustAnchorError> {
    if pem.trim().is_empty() {
        return match requirement {
            SignatureRequirement::Required => Err(TrustAnchorError::Missing),
            SignatureRequirement::Optional => Ok(None),
        };
    }
    TrustAnchor::from_pem(pem).map(Some)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the PEM label of a section kind.
fn section_label(kind: SectionKind) -> String {
    match kind {
        SectionKind::Certificate => "CERTIFICATE",
        SectionKind::PublicKey => "PUBLIC KEY",
        SectionKind::RsaPrivateKey => "RSA PRIVATE KEY",
        SectionKind::PrivateKey => "PRIVATE KEY",
        SectionKind::EcPrivateKey => "EC PRIVATE KEY",
        SectionKind::Crl => "X509 CRL",
        SectionKind::Csr => "CERTIFICATE REQUEST",
        SectionKind::EchConfigList => "ECHCONFIG",
        _ => "unknown block",
    }
    .to_string()
}

/// Returns the label of the first PEM begin marker in `pem`.
fn begin_label(pem: &str) -> String {
    pem.split_once(PEM_BEGIN)
        .and_then(|(_, rest)| rest.split_once("-----"))
        .map_or_else(|| "unknown block".to_string(), |(label, _)| label.to_string())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
