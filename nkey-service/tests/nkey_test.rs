mod common;

use chrono::{Duration, Utc};
use common::{client, TestApp};
use nkey_service::config::ServiceConfig;
use nkey_service::models::{AccessOverride, AppIdSet, AuditAction, NKey, Role};
use nkey_service::services::random::{FailingRandomSource, FixedRandomSource, NKEY_PREFIX};
use nkey_service::services::{CredentialStore, ServiceError};
use std::sync::Arc;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn user_scenario_issue_then_validate() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    app.add_app("B", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    assert!(issued.nkey.starts_with(NKEY_PREFIX));
    assert_eq!(issued.apps.as_slice(), &["A".to_string()]);
    assert_eq!(issued.expires_in, 900);

    let first = app.state.nkeys.validate(&issued.nkey, "A").await.unwrap();
    assert_eq!(first.username, "alice");
    assert_eq!(first.role, Role::User);
    assert!(first.first_use);

    let stored = app.store.find_nkey_by_value(&issued.nkey).await.unwrap().unwrap();
    assert!(stored.is_used);
    assert_eq!(stored.first_used_app.as_deref(), Some("A"));

    let second = app.state.nkeys.validate(&issued.nkey, "A").await.unwrap();
    assert!(!second.first_use);
    let stored = app.store.find_nkey_by_value(&issued.nkey).await.unwrap().unwrap();
    assert_eq!(stored.first_used_app.as_deref(), Some("A"));

    let err = app.state.nkeys.validate(&issued.nkey, "B").await.unwrap_err();
    assert!(matches!(err, ServiceError::ScopeDenied));
}

#[tokio::test]
async fn first_use_records_the_first_app_only() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    app.add_app("B", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A", "B"]), &client())
        .await
        .unwrap();

    assert!(app.state.nkeys.validate(&issued.nkey, "B").await.unwrap().first_use);
    assert!(!app.state.nkeys.validate(&issued.nkey, "A").await.unwrap().first_use);

    let stored = app.store.find_nkey_by_value(&issued.nkey).await.unwrap().unwrap();
    assert_eq!(stored.first_used_app.as_deref(), Some("B"));
}

#[tokio::test]
async fn concurrent_validations_record_first_use_once() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;
    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    let tasks = (0..16).map(|_| {
        let nkeys = app.state.nkeys.clone();
        let key = issued.nkey.clone();
        tokio::spawn(async move { nkeys.validate(&key, "A").await })
    });
    let results = futures::future::join_all(tasks).await;

    let first_uses = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|v| v.first_use)
        .count();
    assert_eq!(first_uses, 1);
}

#[tokio::test]
async fn expiry_is_checked_before_scope() {
    let app = TestApp::spawn();
    let user = app.add_user("alice", Role::User).await;

    let issued_at = Utc::now() - Duration::seconds(1000);
    let nkey = NKey::new(
        format!("{}expired-token", NKEY_PREFIX),
        user.user_id,
        AppIdSet::from_requested(["A"]),
        issued_at,
        issued_at + Duration::seconds(900),
    );
    app.store.create_nkey(&nkey).await.unwrap();

    let in_scope = app.state.nkeys.validate(&nkey.key_value, "A").await.unwrap_err();
    assert!(matches!(in_scope, ServiceError::TokenExpired));

    let out_of_scope = app.state.nkeys.validate(&nkey.key_value, "Z").await.unwrap_err();
    assert!(matches!(out_of_scope, ServiceError::TokenExpired));

    let stored = app.store.find_nkey_by_value(&nkey.key_value).await.unwrap().unwrap();
    assert!(!stored.is_used);
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let app = TestApp::spawn();
    let err = app.state.nkeys.validate("TOUNET_nope", "A").await.unwrap_err();
    assert!(matches!(err, ServiceError::TokenNotFound));
}

#[tokio::test]
async fn trusted_cannot_get_admin_gated_app() {
    let app = TestApp::spawn();
    app.add_app("X", Role::Admin).await;
    let trusted = app.add_user("tina", Role::Trusted).await;

    let err = app
        .state
        .nkeys
        .issue(trusted.user_id, trusted.role, &ids(&["X"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ScopeForbidden(ref id) if id == "X"));
}

#[tokio::test]
async fn trusted_gets_trusted_and_user_apps() {
    let app = TestApp::spawn();
    app.add_app("analytics", Role::Trusted).await;
    app.add_app("search", Role::User).await;
    let trusted = app.add_user("tina", Role::Trusted).await;
    let user = app.add_user("ulysses", Role::User).await;

    let issued = app
        .state
        .nkeys
        .issue(trusted.user_id, trusted.role, &ids(&["analytics", "search"]), &client())
        .await
        .unwrap();
    assert_eq!(issued.apps.len(), 2);

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["analytics"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ScopeForbidden(_)));
}

#[tokio::test]
async fn disabled_user_only_reaches_floor_apps() {
    let app = TestApp::spawn();
    app.add_app("open", Role::DisabledUser).await;
    app.add_app("search", Role::User).await;
    let disabled = app.add_user("dora", Role::DisabledUser).await;

    assert!(app
        .state
        .nkeys
        .issue(disabled.user_id, disabled.role, &ids(&["open"]), &client())
        .await
        .is_ok());

    let err = app
        .state
        .nkeys
        .issue(disabled.user_id, disabled.role, &ids(&["search"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ScopeForbidden(_)));
}

#[tokio::test]
async fn disabled_override_blocks_issuance() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    let entry = AccessOverride::new(user.user_id, "A".to_string(), false);
    app.store.upsert_access_override(&entry).await.unwrap();

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ScopeForbidden(ref id) if id == "A"));
}

#[tokio::test]
async fn lapsed_override_blocks_and_enabled_override_never_widens() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    app.add_app("X", Role::Admin).await;
    let user = app.add_user("alice", Role::User).await;

    let mut lapsed = AccessOverride::new(user.user_id, "A".to_string(), true);
    lapsed.valid_until = Some(Utc::now() - Duration::minutes(5));
    app.store.upsert_access_override(&lapsed).await.unwrap();

    let grant = AccessOverride::new(user.user_id, "X".to_string(), true);
    app.store.upsert_access_override(&grant).await.unwrap();

    for app_id in ["A", "X"] {
        let err = app
            .state
            .nkeys
            .issue(user.user_id, user.role, &ids(&[app_id]), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ScopeForbidden(_)), "{app_id}");
    }
}

#[tokio::test]
async fn unknown_or_inactive_app_fails_without_persisting() {
    let app = TestApp::with_random(Arc::new(FixedRandomSource(7)));
    app.add_app("A", Role::User).await;
    app.add_app("gone", Role::User).await;
    app.deactivate_app("gone").await;
    let user = app.add_user("alice", Role::User).await;

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A", "missing"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownOrInactiveApp(ref id) if id == "missing"));

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["gone"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownOrInactiveApp(_)));

    // The fixed source always yields the same value; it must still be free.
    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();
    assert!(issued.nkey.starts_with(NKEY_PREFIX));
}

#[tokio::test]
async fn forbidden_later_app_aborts_whole_request() {
    let app = TestApp::with_random(Arc::new(FixedRandomSource(9)));
    app.add_app("A", Role::User).await;
    app.add_app("X", Role::Admin).await;
    let user = app.add_user("alice", Role::User).await;

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A", "X"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ScopeForbidden(ref id) if id == "X"));

    // Same fixed value again: a token written by the failed call would collide.
    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();
    assert_eq!(issued.apps.as_slice(), &["A".to_string()]);
}

#[tokio::test]
async fn empty_request_is_a_validation_error() {
    let app = TestApp::spawn();
    let user = app.add_user("alice", Role::User).await;

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &[], &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn padded_app_ids_are_rejected_not_rewritten() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    for requested in [&[" A"][..], &["A "][..], &["A", ""][..]] {
        let err = app
            .state
            .nkeys
            .issue(user.user_id, user.role, &ids(requested), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}

#[tokio::test]
async fn out_of_range_lifetime_fails_instead_of_panicking() {
    let mut config = ServiceConfig::for_tests();
    config.nkey.expiration_seconds = 9_000_000_000_000;
    let app = TestApp::with_config(config);
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Internal(_)));
}

#[tokio::test]
async fn duplicate_app_ids_are_collapsed() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A", "A"]), &client())
        .await
        .unwrap();
    assert_eq!(issued.apps.as_slice(), &["A".to_string()]);
}

#[tokio::test]
async fn value_collision_is_reported_not_overwritten() {
    let app = TestApp::with_random(Arc::new(FixedRandomSource(42)));
    app.add_app("A", Role::User).await;
    let alice = app.add_user("alice", Role::User).await;
    let bob = app.add_user("bob", Role::User).await;

    let first = app
        .state
        .nkeys
        .issue(alice.user_id, alice.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    let err = app
        .state
        .nkeys
        .issue(bob.user_id, bob.role, &ids(&["A"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenCollision));

    let stored = app.store.find_nkey_by_value(&first.nkey).await.unwrap().unwrap();
    assert_eq!(stored.user_id, alice.user_id);
}

#[tokio::test]
async fn random_failure_is_surfaced() {
    let app = TestApp::with_random(Arc::new(FailingRandomSource));
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::RandomGenerationFailed));
}

#[tokio::test]
async fn storage_outage_is_reported() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    app.store.set_unavailable(true);
    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::StorageUnavailable));

    let err = app.state.nkeys.validate("TOUNET_x", "A").await.unwrap_err();
    assert!(matches!(err, ServiceError::StorageUnavailable));
}

#[tokio::test]
async fn issuance_notifies_owner_with_pushdeer_token() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app
        .add_user_with_token("alice", Role::User, Some("PDU-alice"))
        .await;

    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    let messages = app
        .notifier
        .wait_for_messages(1, std::time::Duration::from_secs(2))
        .await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "PDU-alice");
    assert!(messages[0].1.contains(&issued.nkey));
}

#[tokio::test]
async fn no_notification_without_pushdeer_token() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    app.state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    let messages = app
        .notifier
        .wait_for_messages(1, std::time::Duration::from_millis(100))
        .await;
    assert!(messages.is_empty());
}

#[tokio::test]
async fn issuance_is_audited() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let user = app.add_user("alice", Role::User).await;

    app.state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    // The audit write is detached; poll briefly.
    let mut found = false;
    for _ in 0..50 {
        let (records, _) = app.store.list_audit(0, 10).await.unwrap();
        if records.iter().any(|r| r.action == AuditAction::NkeyIssued) {
            found = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(found);
}

#[tokio::test]
async fn removed_owner_invalidates_token() {
    let app = TestApp::spawn();
    app.add_app("A", Role::User).await;
    let admin = app.add_user("root", Role::Admin).await;
    let user = app.add_user("alice", Role::User).await;

    let issued = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &ids(&["A"]), &client())
        .await
        .unwrap();

    app.state
        .admin
        .remove_user(admin.user_id, user.user_id, &client())
        .await
        .unwrap();

    let err = app.state.nkeys.validate(&issued.nkey, "A").await.unwrap_err();
    assert!(matches!(err, ServiceError::TokenNotFound));
}
