//! Concurrency tests: the quota and activation invariants must survive
//! racing writers, not just sequential ones.

#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use common::*;

#[test]
fn test_concurrent_logins_never_exceed_quota() {
    let db = TestDb::new();
    let registry = Arc::new(test_registry(&db));
    registry.provision("LIC-ABC", None).unwrap();
    let account = registry
        .activate(&activate_request("LIC-ABC", "alice", "secret1", "HW1"))
        .unwrap();

    // One slot is taken by HW1; eight distinct fingerprints race for the
    // remaining two.
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.login(&login_request("alice", "secret1", &format!("HW-race-{}", i)))
            })
        })
        .collect();

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.join().expect("login thread panicked") {
            Ok(_) => admitted += 1,
            Err(AppError::DeviceLimitExceeded { .. }) => rejected += 1,
            Err(other) => panic!("unexpected login failure: {:?}", other),
        }
    }

    assert_eq!(admitted, 2, "exactly the free slots should be won");
    assert_eq!(rejected, 6);
    assert_eq!(
        registry.devices(&account.id).unwrap().len(),
        3,
        "the device set must never exceed the quota"
    );
}

#[test]
fn test_concurrent_identical_activations_register_one_device() {
    let db = TestDb::new();
    let registry = Arc::new(test_registry(&db));
    registry.provision("LIC-ABC", None).unwrap();

    // Every racer is the same client retrying: all must succeed, and the
    // device must exist exactly once.
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.activate(&activate_request("LIC-ABC", "alice", "secret1", "HW1"))
            })
        })
        .collect();

    let mut accounts = Vec::new();
    for handle in handles {
        accounts.push(handle.join().expect("activation thread panicked").unwrap());
    }

    let account_id = &accounts[0].id;
    assert!(accounts.iter().all(|a| &a.id == account_id));
    assert!(accounts.iter().all(|a| a.is_activated()));
    assert_eq!(registry.devices(account_id).unwrap().len(), 1);
}

#[test]
fn test_concurrent_divergent_activations_have_one_winner() {
    let db = TestDb::new();
    let registry = Arc::new(test_registry(&db));
    registry.provision("LIC-ABC", None).unwrap();

    // Different identities race for the same code: exactly one wins, the
    // rest see the terminal already-activated state.
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.activate(&activate_request(
                    "LIC-ABC",
                    &format!("user-{}", i),
                    "secret1",
                    &format!("HW-{}", i),
                ))
            })
        })
        .collect();

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.join().expect("activation thread panicked") {
            Ok(account) => {
                winners += 1;
                assert!(account.is_activated());
            }
            Err(AppError::AlreadyActivated) => losers += 1,
            Err(other) => panic!("unexpected activation failure: {:?}", other),
        }
    }

    assert_eq!(winners, 1, "a license must not double-activate");
    assert_eq!(losers, 3);

    let conn = db.pool.get().unwrap();
    let account = queries::get_account_by_code(&conn, "LIC-ABC").unwrap().unwrap();
    assert_eq!(
        queries::count_devices_for_account(&conn, &account.id).unwrap(),
        1,
        "only the winner's device is registered"
    );
}
