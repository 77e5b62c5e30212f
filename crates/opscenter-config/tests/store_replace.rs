// crates/opscenter-config/tests/store_replace.rs
// =============================================================================
// Module: Store Replace Tests
// Description: PUT-style section replacement and policy publication.
// Purpose: Ensure rejected replacements keep the active configuration.
// =============================================================================

//! ## Overview
//! Store replacement tests: accepted sections publish a new version, rejected
//! ones keep the active section and policy, and every outcome is audited.

use std::sync::Arc;
use std::thread;

use opscenter_config::OpsCenterConfig;
use opscenter_config::SystemConfigStore;
use opscenter_config::SystemNetworkConfig;
use opscenter_config::SystemSecurityConfig;
use opscenter_config::SystemUpdatesConfig;
use opscenter_core::ConfigVersion;
use opscenter_core::FilterAuditSink;
use opscenter_core::PolicyError;
use opscenter_core::PolicyState;
use opscenter_core::Update;
use opscenter_core::UpdateFile;

mod common;

use common::RecordingSink;
use common::TestResult;
use common::assert_invalid;

/// Builds a store over the default config with a recording sink.
fn store() -> Result<(SystemConfigStore, Arc<RecordingSink>), String> {
    let sink = Arc::new(RecordingSink::default());
    let audit: Arc<dyn FilterAuditSink> = sink.clone();
    let store = SystemConfigStore::new(OpsCenterConfig::default(), audit)
        .map_err(|err| err.to_string())?;
    Ok((store, sink))
}

/// Builds an update with one file per architecture.
fn update(id: &str, channels: &[&str], architectures: &[&str]) -> Update {
    Update {
        id: id.to_string(),
        channels: channels.iter().map(ToString::to_string).collect(),
        files: architectures
            .iter()
            .map(|arch| UpdateFile {
                filename: format!("{id}-{arch}.img"),
                architecture: Some((*arch).to_string()),
                ..UpdateFile::default()
            })
            .collect(),
        ..Update::default()
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

#[test]
fn new_store_publishes_initial_versions() -> TestResult {
    let (store, sink) = store()?;
    if store.network().version != ConfigVersion::INITIAL {
        return Err("network should start at the initial version".to_string());
    }
    if store.policy_state() != (PolicyState::Compiled { version: ConfigVersion::INITIAL }) {
        return Err("policy should be compiled at the initial version".to_string());
    }
    if sink.changes() != vec![("updates", true)] {
        return Err("expected a single published updates event".to_string());
    }
    Ok(())
}

#[test]
fn invalid_initial_config_is_rejected() -> TestResult {
    let mut config = OpsCenterConfig::default();
    config.updates.filter_expression = "Unknown == 1".to_string();
    let sink = Arc::new(RecordingSink::default());
    assert_invalid(SystemConfigStore::new(config, sink), "invalid filter_expression")
}

// ============================================================================
// SECTION: Section Replacement
// ============================================================================

#[test]
fn bad_bind_address_keeps_previous_network() -> TestResult {
    let (store, sink) = store()?;
    let before = store.network();
    let result = store.replace_network(SystemNetworkConfig {
        rest_server_address: "localhost".to_string(),
        ..SystemNetworkConfig::default()
    });
    assert_invalid(result, "network.rest_server_address")?;
    let after = store.network();
    if after.version != before.version || *after.value != *before.value {
        return Err("network changed after rejected replace".to_string());
    }
    if sink.changes().last() != Some(&("network", false)) {
        return Err("rejected replace should be audited".to_string());
    }
    Ok(())
}

#[test]
fn network_replace_bumps_version() -> TestResult {
    let (store, _sink) = store()?;
    let version = store
        .replace_network(SystemNetworkConfig {
            rest_server_address: "127.0.0.1:9443".to_string(),
            ..SystemNetworkConfig::default()
        })
        .map_err(|err| err.to_string())?;
    if version != ConfigVersion::new(2) {
        return Err(format!("unexpected version {version}"));
    }
    if store.network().value.rest_server_address != "127.0.0.1:9443" {
        return Err("new network not published".to_string());
    }
    Ok(())
}

#[test]
fn replace_is_put_not_patch() -> TestResult {
    let (store, _sink) = store()?;
    store
        .replace_network(SystemNetworkConfig {
            operations_center_address: "https://ops.example.org".to_string(),
            rest_server_address: "127.0.0.1:9443".to_string(),
        })
        .map_err(|err| err.to_string())?;
    store
        .replace_network(SystemNetworkConfig {
            operations_center_address: String::new(),
            rest_server_address: "127.0.0.1:9444".to_string(),
        })
        .map_err(|err| err.to_string())?;
    if !store.network().value.operations_center_address.is_empty() {
        return Err("omitted field should be cleared by replace".to_string());
    }
    Ok(())
}

#[test]
fn security_replace_stores_lowercase_fingerprints() -> TestResult {
    let (store, _sink) = store()?;
    store
        .replace_security(SystemSecurityConfig {
            trusted_tls_client_cert_fingerprints: vec!["CD".repeat(32)],
            ..SystemSecurityConfig::default()
        })
        .map_err(|err| err.to_string())?;
    if store.security().value.trusted_tls_client_cert_fingerprints != vec!["cd".repeat(32)] {
        return Err("fingerprint not normalized in store".to_string());
    }
    Ok(())
}

#[test]
fn duplicate_fingerprints_keep_previous_security() -> TestResult {
    let (store, _sink) = store()?;
    let result = store.replace_security(SystemSecurityConfig {
        trusted_tls_client_cert_fingerprints: vec!["ef".repeat(32), "EF".repeat(32)],
        ..SystemSecurityConfig::default()
    });
    assert_invalid(result, "duplicate")?;
    if store.security().version != ConfigVersion::INITIAL {
        return Err("security version changed after rejected replace".to_string());
    }
    Ok(())
}

#[test]
fn certificate_replace_accepts_generated_pair() -> TestResult {
    let (store, _sink) = store()?;
    let generated = common::generate_ca("opscenter")?;
    let version = store
        .replace_certificate(opscenter_config::SystemCertificate {
            certificate: generated.cert_pem,
            key: generated.key_pem,
        })
        .map_err(|err| err.to_string())?;
    if version != ConfigVersion::new(2) {
        return Err(format!("unexpected version {version}"));
    }
    Ok(())
}

// ============================================================================
// SECTION: Updates and Policy
// ============================================================================

#[test]
fn updates_replace_recompiles_policy() -> TestResult {
    let (store, _sink) = store()?;
    let updates =
        vec![update("u1", &["stable"], &["x86_64", "aarch64"]), update("u2", &["beta"], &[])];
    if store.filter_updates(updates.clone()).accepted.len() != 2 {
        return Err("default policy should accept everything".to_string());
    }

    let version = store
        .replace_updates(SystemUpdatesConfig {
            filter_expression: "'stable' in Channels".to_string(),
            file_filter_expression: "AppliesToArchitecture('x86_64')".to_string(),
            ..SystemUpdatesConfig::default()
        })
        .map_err(|err| err.to_string())?;
    if version != ConfigVersion::new(2) || store.updates().version != version {
        return Err("updates section and policy versions diverged".to_string());
    }

    let outcome = store.filter_updates(updates);
    let [kept] = outcome.accepted.as_slice() else {
        return Err(format!("expected one update, got {}", outcome.accepted.len()));
    };
    let architectures: Vec<_> =
        kept.files.iter().map(|file| file.architecture.as_deref()).collect();
    if kept.id != "u1" || architectures != vec![Some("x86_64")] {
        return Err("unexpected filtered update".to_string());
    }
    Ok(())
}

#[test]
fn invalid_updates_keep_previous_policy() -> TestResult {
    let (store, sink) = store()?;
    store
        .replace_updates(SystemUpdatesConfig {
            filter_expression: "'stable' in Channels".to_string(),
            ..SystemUpdatesConfig::default()
        })
        .map_err(|err| err.to_string())?;
    let before = store.policy();

    let result = store.replace_updates(SystemUpdatesConfig {
        filter_expression: "Channels contains".to_string(),
        ..SystemUpdatesConfig::default()
    });
    assert_invalid(result, "invalid filter_expression")?;

    if !Arc::ptr_eq(&before, &store.policy()) {
        return Err("active policy replaced by invalid config".to_string());
    }
    if store.updates().value.filter_expression != "'stable' in Channels" {
        return Err("updates section replaced by invalid config".to_string());
    }
    match store.policy_state() {
        PolicyState::Invalid { active: Some(version), .. } if version == ConfigVersion::new(2) => {}
        _ => return Err("policy should report invalid with v2 active".to_string()),
    }
    if sink.changes().last() != Some(&("updates", false)) {
        return Err("rejected updates should be audited".to_string());
    }
    Ok(())
}

#[test]
fn malformed_source_is_rejected_before_compiling() -> TestResult {
    let (store, sink) = store()?;
    let result = store.replace_updates(SystemUpdatesConfig {
        source: "not a url".to_string(),
        ..SystemUpdatesConfig::default()
    });
    assert_invalid(result, "updates.source")?;
    if store.updates().version != ConfigVersion::INITIAL {
        return Err("updates version changed".to_string());
    }
    if sink.changes().last() != Some(&("updates", false)) {
        return Err("rejected source should be audited".to_string());
    }
    Ok(())
}

#[test]
fn rejected_source_marks_policy_invalid_until_next_publish() -> TestResult {
    let (store, _sink) = store()?;
    let result = store.replace_updates(SystemUpdatesConfig {
        source: "ftp://updates.example.org".to_string(),
        ..SystemUpdatesConfig::default()
    });
    assert_invalid(result, "updates.source")?;
    match store.policy_state() {
        PolicyState::Invalid { active: Some(version), error: PolicyError::Source(_) }
            if version == ConfigVersion::INITIAL => {}
        _ => return Err("policy should report an invalid source with v1 active".to_string()),
    }

    let version = store
        .replace_updates(SystemUpdatesConfig::default())
        .map_err(|err| err.to_string())?;
    if store.policy_state() != (PolicyState::Compiled { version }) {
        return Err("a later publish should clear the rejection".to_string());
    }
    Ok(())
}

#[test]
fn readers_keep_snapshot_across_replace() -> TestResult {
    let (store, _sink) = store()?;
    let snapshot = store.policy();
    store
        .replace_updates(SystemUpdatesConfig {
            filter_expression: "false".to_string(),
            ..SystemUpdatesConfig::default()
        })
        .map_err(|err| err.to_string())?;
    let batch = vec![update("u1", &["stable"], &[])];
    let held = snapshot.filter_updates(batch.clone(), store.audit_sink());
    let current = store.filter_updates(batch);
    if held.accepted.len() != 1 || !current.accepted.is_empty() {
        return Err("held snapshot should keep the old policy".to_string());
    }
    Ok(())
}

#[test]
fn concurrent_updates_replacements_are_serialized() -> TestResult {
    let (store, _sink) = store()?;
    let store = Arc::new(store);
    let handles: Vec<_> = (0..8)
        .map(|index| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.replace_updates(SystemUpdatesConfig {
                    filter_expression: format!("len(Channels) >= {index}"),
                    ..SystemUpdatesConfig::default()
                })
            })
        })
        .collect();
    for handle in handles {
        handle
            .join()
            .map_err(|_| "writer thread panicked".to_string())?
            .map_err(|err| err.to_string())?;
    }
    let updates = store.updates();
    let policy_version = match store.policy_state() {
        PolicyState::Compiled { version } => version,
        _ => return Err("policy should be compiled".to_string()),
    };
    if updates.version != ConfigVersion::new(9) || policy_version != updates.version {
        return Err(format!("versions diverged: section {} policy {policy_version}", updates.version));
    }
    if store.policy().update_filter().expression().source() != updates.value.filter_expression {
        return Err("published section does not match active policy".to_string());
    }
    Ok(())
}
