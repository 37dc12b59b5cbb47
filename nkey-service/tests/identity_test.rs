mod common;

use common::{TestApp, TEST_PASSWORD};
use nkey_service::config::ServiceConfig;
use nkey_service::models::{AccessOverride, Role};
use nkey_service::services::identity::ProfileUpdate;
use nkey_service::services::{CredentialStore, RegisterInput, ServiceError};
use nkey_service::utils::Password;

fn registration(username: &str, code: &str) -> RegisterInput {
    RegisterInput {
        username: username.to_string(),
        password: Password::new("new-user-pass"),
        invite_code: code.to_string(),
        phone: None,
        pushdeer_token: Some("PDU-new".to_string()),
    }
}

#[tokio::test]
async fn register_consumes_invite_and_issues_session() {
    let app = TestApp::spawn();
    app.add_invite("invite-1").await;

    let registration = app
        .state
        .identity
        .register(registration("newbie", "invite-1"))
        .await
        .unwrap();

    assert_eq!(registration.user.role, Role::User);
    assert_eq!(registration.session.token_type, "Bearer");
    assert_eq!(registration.session.expires_in, 1440 * 60);

    let claims = app
        .state
        .identity
        .verify_session(&registration.session.token)
        .unwrap();
    assert_eq!(claims.user_id(), Some(registration.user.user_id));

    let invite = app.store.find_invite_code("invite-1").await.unwrap().unwrap();
    assert_eq!(invite.redeemed_by, Some(registration.user.user_id));
    assert!(invite.redeemed_utc.is_some());
}

#[tokio::test]
async fn redeemed_invite_is_rejected_regardless_of_username() {
    let app = TestApp::spawn();
    app.add_invite("invite-1").await;
    app.state
        .identity
        .register(registration("first", "invite-1"))
        .await
        .unwrap();

    for username in ["second", "first"] {
        let err = app
            .state
            .identity
            .register(registration(username, "invite-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInvite), "{username}");
    }
}

#[tokio::test]
async fn unknown_invite_is_rejected() {
    let app = TestApp::spawn();
    let err = app
        .state
        .identity
        .register(registration("newbie", "no-such-code"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInvite));
}

#[tokio::test]
async fn taken_username_leaves_invite_unredeemed() {
    let app = TestApp::spawn();
    app.add_user("alice", Role::User).await;
    app.add_invite("invite-1").await;

    let err = app
        .state
        .identity
        .register(registration("alice", "invite-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UsernameTaken));

    let invite = app.store.find_invite_code("invite-1").await.unwrap().unwrap();
    assert!(!invite.is_redeemed());
}

#[tokio::test]
async fn concurrent_redemption_has_exactly_one_winner() {
    let app = TestApp::spawn();
    app.add_invite("shared").await;

    let tasks = (0..12).map(|i| {
        let identity = app.state.identity.clone();
        tokio::spawn(async move {
            identity
                .register(registration(&format!("racer{i}"), "shared"))
                .await
        })
    });
    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let invalid = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::InvalidInvite)))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(invalid, results.len() - 1);
}

#[tokio::test]
async fn login_succeeds_and_records_last_login() {
    let app = TestApp::spawn();
    let user = app.add_user("alice", Role::Trusted).await;
    assert!(user.last_login_utc.is_none());

    let session = app
        .state
        .identity
        .login("alice", &Password::new(TEST_PASSWORD))
        .await
        .unwrap();

    let claims = app.state.identity.verify_session(&session.token).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role, Role::Trusted);

    let stored = app.store.find_user_by_id(user.user_id).await.unwrap().unwrap();
    assert!(stored.last_login_utc.is_some());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::spawn();
    app.add_user("alice", Role::User).await;

    let wrong_password = app
        .state
        .identity
        .login("alice", &Password::new("not-it"))
        .await
        .unwrap_err();
    let unknown_user = app
        .state
        .identity
        .login("nobody", &Password::new(TEST_PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, ServiceError::InvalidCredentials));
    assert!(matches!(unknown_user, ServiceError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

#[tokio::test]
async fn tampered_session_is_invalid() {
    let app = TestApp::spawn();
    let user = app.add_user("alice", Role::User).await;
    let token = app.session_for(&user);

    let mut tampered = token.clone();
    tampered.push('x');
    assert!(matches!(
        app.state.identity.verify_session(&tampered),
        Err(ServiceError::InvalidSession)
    ));
    assert!(matches!(
        app.state.identity.verify_session("not-a-jwt"),
        Err(ServiceError::InvalidSession)
    ));
}

#[tokio::test]
async fn out_of_range_session_lifetime_fails_instead_of_panicking() {
    let mut config = ServiceConfig::for_tests();
    config.jwt.expiration_minutes = i64::MAX / 2;
    let app = TestApp::with_config(config);
    let user = app.add_user("alice", Role::User).await;

    assert!(matches!(
        app.state.identity.issue_session(&user),
        Err(ServiceError::Internal(_))
    ));
}

#[tokio::test]
async fn authenticate_reads_current_role() {
    let app = TestApp::spawn();
    let mut user = app.add_user("alice", Role::User).await;
    let token = app.session_for(&user);

    user.role = Role::Trusted;
    app.store.save_user(&user).await.unwrap();

    let current = app.state.identity.authenticate(&token).await.unwrap();
    assert_eq!(current.role, Role::Trusted);
}

#[tokio::test]
async fn profile_update_keeps_absent_fields() {
    let app = TestApp::spawn();
    let user = app
        .add_user_with_token("alice", Role::User, Some("PDU-old"))
        .await;

    let updated = app
        .state
        .identity
        .update_profile(
            user.user_id,
            ProfileUpdate {
                phone: Some("+15550100".to_string()),
                pushdeer_token: Some(String::new()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.phone.as_deref(), Some("+15550100"));
    assert_eq!(updated.pushdeer_token.as_deref(), Some("PDU-old"));
}

#[tokio::test]
async fn allowed_apps_follow_role_and_flag_overrides() {
    let app = TestApp::spawn();
    app.add_app("search", Role::User).await;
    app.add_app("render", Role::User).await;
    app.add_app("analytics", Role::Trusted).await;
    app.add_app("console", Role::Admin).await;
    app.add_app("retired", Role::User).await;
    app.deactivate_app("retired").await;
    let user = app.add_user("alice", Role::User).await;

    let blocked = AccessOverride::new(user.user_id, "render".to_string(), false);
    app.store.upsert_access_override(&blocked).await.unwrap();

    let allowed = app
        .state
        .identity
        .allowed_apps(user.user_id, user.role)
        .await
        .unwrap();

    let mut listed: Vec<_> = allowed
        .iter()
        .map(|a| (a.app.app_id.as_str(), a.usable))
        .collect();
    listed.sort();
    assert_eq!(listed, vec![("render", false), ("search", true)]);

    let render = allowed.iter().find(|a| a.app.app_id == "render").unwrap();
    assert_eq!(render.override_enabled, Some(false));
}
