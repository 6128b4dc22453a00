//! Trust registry loading: offline directories, remote fetch, caching and
//! fail-closed behavior.

use std::time::Duration;

use proptest::prelude::*;
use sie_crypto::{b64_decode, b64_encode};
use sie_verify_core::registry::{REGISTRY_FILE, ROOT_KEY_FILE, SIGNATURE_FILE};
use sie_verify_core::{RegistryClient, RegistryConfig};

use crate::fixtures::{dead_url, issuer_record, revocation_record, serve, World, ISSUER};

fn remote(url: &str, world: &World) -> RegistryConfig {
    let mut config = RegistryConfig::remote(url, world.path().join("cache"));
    config.timeout = Duration::from_secs(2);
    config
}

#[test]
fn offline_snapshot_answers_presence() {
    let world = World::new();
    let client = RegistryClient::new(RegistryConfig::offline(world.registry_dir()));

    assert!(client.is_issuer_present(ISSUER).unwrap());
    assert!(!client.is_issuer_present("unknown").unwrap());
    assert!(!client.is_key_revoked(ISSUER, &world.issuer_key()).unwrap());
}

#[test]
fn revocation_overrides_presence() {
    let world = World::new();
    let key = world.issuer_key();
    world.write_registry(&[issuer_record(ISSUER, &key), revocation_record(ISSUER, &key)]);

    let client = RegistryClient::new(RegistryConfig::offline(world.registry_dir()));
    assert!(client.is_issuer_present(ISSUER).unwrap());
    assert!(client.is_key_revoked(ISSUER, &key).unwrap());

    let env = world.envelope("summarize the page", None);
    let err = world
        .verifier()
        .verify(&env, &world.keyring(), None)
        .unwrap_err();
    assert_eq!(err.code(), "key_revoked");
}

#[test]
fn tampered_snapshot_rejected() {
    let world = World::new();
    let reg = world.registry_dir().join(REGISTRY_FILE);
    let text = std::fs::read_to_string(&reg).unwrap();
    std::fs::write(&reg, text.replace(ISSUER, "mallory")).unwrap();

    let client = RegistryClient::new(RegistryConfig::offline(world.registry_dir()));
    let err = client.load_verified_snapshot().unwrap_err();
    assert_eq!(err.code(), "registry_signature_invalid");
}

#[test]
fn pinned_root_key_mismatch_rejected() {
    let world = World::new();
    let mut config = RegistryConfig::offline(world.registry_dir());
    config.pinned_root_key = Some(b64_encode(&[7u8; 32]));

    let err = RegistryClient::new(config).load_verified_snapshot().unwrap_err();
    assert_eq!(err.code(), "registry_signature_invalid");
}

#[test]
fn remote_fetch_populates_cache() {
    let world = World::new();
    let artifacts = world.artifacts(&[issuer_record(ISSUER, &world.issuer_key())]);
    let server = serve(artifacts.routes());

    let client = RegistryClient::new(remote(&server.base_url, &world));
    let snapshot = client.load_verified_snapshot().unwrap();
    assert!(snapshot.is_issuer_present(ISSUER));
    assert_eq!(server.hits(), 3);

    let cache = world.path().join("cache");
    assert_eq!(std::fs::read(cache.join(REGISTRY_FILE)).unwrap(), artifacts.registry);
    assert!(cache.join(SIGNATURE_FILE).is_file());
    assert!(cache.join(ROOT_KEY_FILE).is_file());

    // Fresh cache is reused without another fetch.
    client.load_verified_snapshot().unwrap();
    assert_eq!(server.hits(), 3);
}

#[test]
fn zero_max_age_refreshes_every_load() {
    let world = World::new();
    let artifacts = world.artifacts(&[issuer_record(ISSUER, &world.issuer_key())]);
    let server = serve(artifacts.routes());

    let mut config = remote(&server.base_url, &world);
    config.max_cache_age = Some(Duration::ZERO);
    let client = RegistryClient::new(config);

    client.load_verified_snapshot().unwrap();
    client.load_verified_snapshot().unwrap();
    assert_eq!(server.hits(), 6);
}

#[test]
fn partial_fetch_leaves_no_cache() {
    let world = World::new();
    let artifacts = world.artifacts(&[issuer_record(ISSUER, &world.issuer_key())]);
    let mut routes = artifacts.routes();
    routes.remove(&format!("/registry/{}", SIGNATURE_FILE));
    let server = serve(routes);

    let client = RegistryClient::new(remote(&server.base_url, &world));
    let err = client.load_verified_snapshot().unwrap_err();
    assert_eq!(err.code(), "registry_unreachable");
    assert!(!world.path().join("cache").join(REGISTRY_FILE).exists());
}

#[test]
fn unreachable_registry_fails_closed() {
    let world = World::new();
    let client = RegistryClient::new(remote(&dead_url(), &world));

    let err = client.load_verified_snapshot().unwrap_err();
    assert_eq!(err.code(), "registry_unreachable");
    assert!(err.is_registry_failure());
}

#[test]
fn stale_cache_with_unreachable_registry_fails() {
    let world = World::new();
    world
        .artifacts(&[issuer_record(ISSUER, &world.issuer_key())])
        .write_to(&world.path().join("cache"));

    let mut config = remote(&dead_url(), &world);
    config.max_cache_age = Some(Duration::ZERO);
    let err = RegistryClient::new(config).load_verified_snapshot().unwrap_err();
    assert_eq!(err.code(), "registry_unreachable");
}

#[test]
fn cache_without_age_limit_is_used_offline() {
    let world = World::new();
    world
        .artifacts(&[issuer_record(ISSUER, &world.issuer_key())])
        .write_to(&world.path().join("cache"));

    let mut config = remote(&dead_url(), &world);
    config.max_cache_age = None;
    let snapshot = RegistryClient::new(config).load_verified_snapshot().unwrap();
    assert!(snapshot.is_issuer_present(ISSUER));
}

#[test]
fn cached_snapshot_reverified_on_read() {
    let world = World::new();
    let cache = world.path().join("cache");
    world
        .artifacts(&[issuer_record(ISSUER, &world.issuer_key())])
        .write_to(&cache);
    std::fs::write(cache.join(REGISTRY_FILE), br#"{"records":[]}"#).unwrap();

    let mut config = remote(&dead_url(), &world);
    config.max_cache_age = None;
    let err = RegistryClient::new(config).load_verified_snapshot().unwrap_err();
    assert_eq!(err.code(), "registry_signature_invalid");
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    /// Corrupting any byte of the snapshot signature fails the load.
    #[test]
    fn corrupted_signature_byte_fails(pos in 0usize..64, delta in 1u8..=255) {
        let world = World::new();
        let sig_path = world.registry_dir().join(SIGNATURE_FILE);
        let text = std::fs::read_to_string(&sig_path).unwrap();
        let mut sig = b64_decode(&text, "sig").unwrap();
        sig[pos] = sig[pos].wrapping_add(delta);
        std::fs::write(&sig_path, b64_encode(&sig)).unwrap();

        let client = RegistryClient::new(RegistryConfig::offline(world.registry_dir()));
        let err = client.load_verified_snapshot().unwrap_err();
        prop_assert_eq!(err.code(), "registry_signature_invalid");
    }
}
