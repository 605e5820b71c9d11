//! Database device admission tests

#[path = "common/mod.rs"]
mod common;

use common::*;
use keyward::db::queries::DeviceAdmission;
use rusqlite::params;

fn provisioned_account(conn: &rusqlite::Connection) -> Account {
    queries::provision_account(conn, "LIC-ABC", None).expect("Failed to provision account")
}

#[test]
fn test_admit_new_device() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);

    let admission =
        queries::add_device_if_under_quota(&mut conn, &account.id, "HW1", 3).unwrap();

    let DeviceAdmission::Registered(device) = admission else {
        panic!("expected Registered admission");
    };
    assert!(device.id.starts_with("kw_dev_"));
    assert_eq!(device.fingerprint, "HW1");
    assert_eq!(device.first_seen_at, device.last_seen_at);
    assert_eq!(queries::count_devices_for_account(&conn, &account.id).unwrap(), 1);
}

#[test]
fn test_admit_known_device_touches_last_seen() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);
    queries::add_device_if_under_quota(&mut conn, &account.id, "HW1", 3).unwrap();

    // Age the row so the touch is observable.
    conn.execute(
        "UPDATE devices SET last_seen_at = ?1 WHERE account_id = ?2",
        params![past_timestamp(7), account.id],
    )
    .unwrap();

    let admission =
        queries::add_device_if_under_quota(&mut conn, &account.id, "HW1", 3).unwrap();
    let DeviceAdmission::Existing(device) = admission else {
        panic!("expected Existing admission");
    };
    assert!(
        device.last_seen_at > past_timestamp(7),
        "last_seen_at should move forward on re-admission"
    );
    assert_eq!(
        queries::count_devices_for_account(&conn, &account.id).unwrap(),
        1,
        "re-admission must not duplicate the device row"
    );
}

#[test]
fn test_quota_enforced() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);

    for fp in ["HW1", "HW2", "HW3"] {
        queries::add_device_if_under_quota(&mut conn, &account.id, fp, 3).unwrap();
    }

    let err = queries::add_device_if_under_quota(&mut conn, &account.id, "HW4", 3).unwrap_err();
    match err {
        AppError::DeviceLimitExceeded { registered, limit } => {
            assert_eq!(registered, 3);
            assert_eq!(limit, 3);
        }
        other => panic!("expected DeviceLimitExceeded, got {:?}", other),
    }
    assert_eq!(queries::count_devices_for_account(&conn, &account.id).unwrap(), 3);
}

#[test]
fn test_known_device_bypasses_quota() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);

    for fp in ["HW1", "HW2", "HW3"] {
        queries::add_device_if_under_quota(&mut conn, &account.id, fp, 3).unwrap();
    }

    // At quota, a registered fingerprint still gets in.
    let admission =
        queries::add_device_if_under_quota(&mut conn, &account.id, "HW2", 3).unwrap();
    assert!(matches!(admission, DeviceAdmission::Existing(_)));
}

#[test]
fn test_same_fingerprint_different_accounts() {
    let mut conn = setup_test_db();
    let a = queries::provision_account(&conn, "LIC-A", None).unwrap();
    let b = queries::provision_account(&conn, "LIC-B", None).unwrap();

    // Device identity is per-account, not global.
    queries::add_device_if_under_quota(&mut conn, &a.id, "HW1", 3).unwrap();
    queries::add_device_if_under_quota(&mut conn, &b.id, "HW1", 3).unwrap();

    assert_eq!(queries::count_devices_for_account(&conn, &a.id).unwrap(), 1);
    assert_eq!(queries::count_devices_for_account(&conn, &b.id).unwrap(), 1);
}

#[test]
fn test_list_devices_ordered_by_first_seen() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);

    for (i, fp) in ["HW1", "HW2", "HW3"].iter().enumerate() {
        queries::add_device_if_under_quota(&mut conn, &account.id, fp, 3).unwrap();
        // Separate the timestamps explicitly; the clock may not tick
        // between inserts.
        conn.execute(
            "UPDATE devices SET first_seen_at = ?1 WHERE account_id = ?2 AND fingerprint = ?3",
            params![past_timestamp(3 - i as i64), account.id, fp],
        )
        .unwrap();
    }

    let devices = queries::list_devices_for_account(&conn, &account.id).unwrap();
    let fingerprints: Vec<&str> = devices.iter().map(|d| d.fingerprint.as_str()).collect();
    assert_eq!(fingerprints, vec!["HW1", "HW2", "HW3"]);
}

#[test]
fn test_remove_device_deletes_its_sessions() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);
    queries::add_device_if_under_quota(&mut conn, &account.id, "HW1", 3).unwrap();
    queries::add_device_if_under_quota(&mut conn, &account.id, "HW2", 3).unwrap();

    for (id, hash, fp) in [("ses-hw1", "hash-hw1", "HW1"), ("ses-hw2", "hash-hw2", "HW2")] {
        let session = Session {
            id: id.to_string(),
            token_hash: hash.to_string(),
            account_id: account.id.clone(),
            fingerprint: fp.to_string(),
            issued_at: now(),
            expires_at: future_timestamp(30),
        };
        queries::insert_session(&conn, &session).unwrap();
    }

    assert!(queries::remove_device(&mut conn, &account.id, "HW1").unwrap());

    assert_eq!(queries::count_devices_for_account(&conn, &account.id).unwrap(), 1);
    assert!(
        queries::get_session_by_token_hash(&conn, "hash-hw1").unwrap().is_none(),
        "sessions bound to a removed device must die with it"
    );
    assert!(
        queries::get_session_by_token_hash(&conn, "hash-hw2").unwrap().is_some(),
        "sessions on other devices are untouched"
    );
}

#[test]
fn test_remove_unknown_device_is_noop() {
    let mut conn = setup_test_db();
    let account = provisioned_account(&conn);

    assert!(!queries::remove_device(&mut conn, &account.id, "HW-NOPE").unwrap());
}
