//! End-to-end session lifecycle scenarios against the public API.

use std::collections::HashSet;
use std::sync::Arc;

use kyber_custody::config::{CustodyConfig, DuplicatePolicy};
use kyber_custody::crypto::{MlKem512, PUBLIC_KEY_SIZE};
use kyber_custody::storage::SessionStore;
use kyber_custody::time::ManualClock;
use kyber_custody::{Error, KeyCustodyService, KeyEncapsulation, SessionState};

const START: i64 = 1_700_000_000;

fn service_with(config: CustodyConfig) -> (KeyCustodyService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let store = SessionStore::open_in_memory().unwrap();
    store.init().unwrap();
    let service = KeyCustodyService::new(store, MlKem512::new(), config)
        .unwrap()
        .with_clock(clock.clone());
    (service, clock)
}

fn service() -> (KeyCustodyService, Arc<ManualClock>) {
    service_with(CustodyConfig::default())
}

#[test]
fn test_session_expires_and_is_swept() {
    let (service, clock) = service();
    service.generate_for_session("A", 1).unwrap();

    let view = service.masked_view().unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].session_id, "A");
    assert!(view[0].seconds_until_expiry > 0);

    clock.advance(65);
    assert_eq!(service.sweep_expired().unwrap(), 1);
    assert!(service
        .masked_view()
        .unwrap()
        .iter()
        .all(|s| s.session_id != "A"));
}

#[test]
fn test_two_party_shared_secret() {
    let (service, _) = service();
    let keys = service.generate_for_session("B", 5).unwrap();

    // Peer encapsulates to the published key with its own provider
    let peer = MlKem512::new();
    let (ciphertext, peer_secret) = peer.encapsulate(&keys.public_key).unwrap();

    let custodian_secret = service.decapsulate_for_session("B", &ciphertext).unwrap();
    assert_eq!(custodian_secret.as_bytes().len(), 32);
    assert_eq!(custodian_secret.as_bytes(), peer_secret.as_bytes());
}

#[test]
fn test_expiry_is_creation_plus_validity() {
    let (service, _) = service();
    for (i, minutes) in [1u32, 5, 60, 1440].into_iter().enumerate() {
        let keys = service.generate_for_session(&format!("s{}", i), minutes).unwrap();
        assert_eq!(keys.expiry, keys.created_at + i64::from(minutes) * 60);
    }
}

#[test]
fn test_sweep_removes_only_reached_expiries() {
    let (service, _) = service();
    service.generate_for_session("short", 1).unwrap();
    service.generate_for_session("long", 10).unwrap();

    assert_eq!(service.sweep(START + 59).unwrap(), 0);
    assert_eq!(service.sweep(START + 60).unwrap(), 1);
    assert_eq!(service.session_state("short").unwrap(), SessionState::NonExistent);
    assert_eq!(service.session_state("long").unwrap(), SessionState::Active);

    assert_eq!(service.sweep(START + 599).unwrap(), 0);
    assert_eq!(service.sweep(START + 600).unwrap(), 1);
}

#[test]
fn test_uniqueness_holds_under_reject() {
    let (service, _) = service();
    service.generate_for_session("S", 5).unwrap();
    for _ in 0..5 {
        assert!(matches!(
            service.generate_for_session("S", 5),
            Err(Error::DuplicateSession(_))
        ));
    }
    assert_eq!(service.store().count().unwrap(), 1);
}

#[test]
fn test_uniqueness_holds_under_replace() {
    let (service, _) = service_with(CustodyConfig {
        duplicate_policy: DuplicatePolicy::Replace,
        ..CustodyConfig::default()
    });

    let mut last = None;
    for _ in 0..5 {
        last = Some(service.generate_for_session("S", 5).unwrap().public_key);
    }
    assert_eq!(service.store().count().unwrap(), 1);

    let (stored, _) = service.store().public_key("S").unwrap().unwrap();
    assert_eq!(Some(stored), last);
}

#[test]
fn test_masked_view_never_leaks_secret_bytes() {
    let (service, _) = service();
    let mut secrets = Vec::new();
    let mut publics = Vec::new();
    for i in 0..10 {
        let keys = service.generate_for_session(&format!("m{}", i), 5).unwrap();
        publics.push(keys.public_key.clone());
        secrets.push(keys.secret_key.as_bytes().to_vec());
    }

    let view = service.masked_view().unwrap();
    assert_eq!(view.len(), 10);

    let rendered = serde_json::to_string(&view).unwrap();
    for (session, public) in view.iter().zip(&publics) {
        // At most 8 bytes, i.e. 16 hex characters, of each public key
        assert!(session.key_prefix.len() <= 16);
        assert_eq!(session.key_prefix, hex::encode(public.prefix(8)));
        assert_eq!(session.masked_bytes, PUBLIC_KEY_SIZE - 8);
    }
    for secret in &secrets {
        // Any 16-byte window of a secret key would be a leak
        assert!(!rendered.contains(&hex::encode(&secret[..16])));
        assert!(!rendered.contains(&hex::encode(&secret[secret.len() - 16..])));
    }
}

#[test]
fn test_revocation_is_idempotent() {
    let (service, _) = service();
    service.generate_for_session("S", 5).unwrap();

    assert_eq!(service.revoke_session("S").unwrap(), 1);
    assert!(service.masked_view().unwrap().iter().all(|s| s.session_id != "S"));
    assert_eq!(service.revoke_session("S").unwrap(), 0);
}

#[test]
fn test_concurrent_generation_distinct_ids() {
    let (service, _) = service();
    const THREADS: usize = 8;
    const PER_THREAD: usize = 4;

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let service = &service;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    service
                        .generate_for_session(&format!("t{}-{}", t, i), 5)
                        .unwrap();
                }
            });
        }
    });

    let view = service.masked_view().unwrap();
    assert_eq!(view.len(), THREADS * PER_THREAD);
    let ids: HashSet<_> = view.iter().map(|s| s.session_id.clone()).collect();
    assert_eq!(ids.len(), THREADS * PER_THREAD);
}

#[test]
fn test_interleaved_sweeps_spare_live_sessions() {
    let (service, clock) = service();
    for i in 0..4 {
        service.generate_for_session(&format!("old{}", i), 1).unwrap();
    }
    clock.advance(120);

    std::thread::scope(|scope| {
        let generator = &service;
        scope.spawn(move || {
            for i in 0..8 {
                generator
                    .generate_for_session(&format!("new{}", i), 10)
                    .unwrap();
            }
        });
        for _ in 0..4 {
            let sweeper = &service;
            scope.spawn(move || {
                sweeper.sweep_expired().unwrap();
            });
        }
    });

    let view = service.masked_view().unwrap();
    let ids: HashSet<_> = view.iter().map(|s| s.session_id.as_str()).collect();
    for i in 0..8 {
        assert!(ids.contains(format!("new{}", i).as_str()));
    }
    for i in 0..4 {
        assert!(!ids.contains(format!("old{}", i).as_str()));
    }
}

#[test]
fn test_on_disk_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = CustodyConfig {
        database_path: Some(dir.path().join("custody.db")),
        ..CustodyConfig::default()
    };

    let (ciphertext, sent) = {
        let service = KeyCustodyService::open(config.clone()).unwrap();
        service.generate_for_session("persist", 30).unwrap();
        let pair = service.encapsulate_for_session("persist").unwrap();
        service.close().unwrap();
        pair
    };

    let service = KeyCustodyService::open(config).unwrap();
    assert_eq!(service.session_state("persist").unwrap(), SessionState::Active);
    let recovered = service
        .decapsulate_for_session("persist", &ciphertext)
        .unwrap();
    assert_eq!(recovered, sent);
}
