// crates/opscenter-config/tests/load_validation.rs
// =============================================================================
// Module: Load Validation Tests
// Description: File loading limits, parse errors, and the example config.
// Purpose: Ensure configuration loading fails closed.
// =============================================================================

//! ## Overview
//! Loading tests: size limits, TOML parse errors, and the bundled example
//! configuration.

use std::fs;

use opscenter_config::ConfigError;
use opscenter_config::OpsCenterConfig;
use opscenter_config::config_toml_example;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;

/// Writes `contents` to a config file in a fresh temp dir.
fn write_config(contents: &[u8]) -> Result<(TempDir, std::path::PathBuf), String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("opscenter.toml");
    fs::write(&path, contents).map_err(|err| err.to_string())?;
    Ok((dir, path))
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn example_config_loads_and_validates() -> TestResult {
    let (_dir, path) = write_config(config_toml_example().as_bytes())?;
    let config = OpsCenterConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.network.operations_center_address != "https://opscenter.example.com:7443" {
        return Err(format!("unexpected address {}", config.network.operations_center_address));
    }
    if config.updates.filter_expression.is_empty() {
        return Err("expected filter expression from example".to_string());
    }
    Ok(())
}

#[test]
fn empty_file_yields_defaults() -> TestResult {
    let (_dir, path) = write_config(b"")?;
    let config = OpsCenterConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.network.rest_server_address != "[::]:7443" {
        return Err(format!("unexpected bind {}", config.network.rest_server_address));
    }
    if config != OpsCenterConfig::default() {
        return Err("empty config should equal defaults".to_string());
    }
    Ok(())
}

#[test]
fn missing_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    match OpsCenterConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("expected io error, got {other}")),
        Ok(_) => Err("expected io error".to_string()),
    }
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let mut contents = String::from("# padding\n");
    contents.push_str(&"#".repeat(1024 * 1024 + 1));
    let (_dir, path) = write_config(contents.as_bytes())?;
    assert_invalid(OpsCenterConfig::load(Some(&path)), "exceeds size limit")
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    let (_dir, path) = write_config(&[0xff, 0xfe, 0x00])?;
    assert_invalid(OpsCenterConfig::load(Some(&path)), "utf-8")
}

#[test]
fn malformed_toml_is_parse_error() -> TestResult {
    let (_dir, path) = write_config(b"[network\naddress = ")?;
    match OpsCenterConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("expected parse error, got {other}")),
        Ok(_) => Err("expected parse error".to_string()),
    }
}

#[test]
fn long_path_component_is_rejected() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("a".repeat(300));
    assert_invalid(OpsCenterConfig::load(Some(&path)), "component too long")
}

#[test]
fn invalid_section_fails_load() -> TestResult {
    let (_dir, path) = write_config(b"[network]\nrest_server_address = \"nope\"\n")?;
    assert_invalid(OpsCenterConfig::load(Some(&path)), "network.rest_server_address")
}

#[test]
fn load_normalizes_fingerprints() -> TestResult {
    let upper = "AB".repeat(32);
    let contents = format!("[security]\ntrusted_tls_client_cert_fingerprints = [\"{upper}\"]\n");
    let (_dir, path) = write_config(contents.as_bytes())?;
    let config = OpsCenterConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.security.trusted_tls_client_cert_fingerprints != vec!["ab".repeat(32)] {
        return Err("fingerprints should be lowercased".to_string());
    }
    Ok(())
}

#[test]
fn network_address_uses_toml_name() -> TestResult {
    let config = common::config_from_toml("[network]\naddress = \"https://ops.example.org\"\n")
        .map_err(|err| err.to_string())?;
    if config.network.operations_center_address != "https://ops.example.org" {
        return Err("address should map to operations_center_address".to_string());
    }
    Ok(())
}
