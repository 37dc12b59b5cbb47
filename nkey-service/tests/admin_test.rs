mod common;

use chrono::{Duration, Utc};
use common::{client, TestApp};
use nkey_service::models::{AuditAction, Role};
use nkey_service::services::admin::{
    CreateApp, CreateUser, SetAccessOverride, UpdateApp, UpdateUser,
};
use nkey_service::services::{CredentialStore, Pagination, ServiceError};
use nkey_service::utils::Password;

fn new_user(username: &str) -> CreateUser {
    CreateUser {
        username: username.to_string(),
        password: Password::new("admin-made-pass"),
        phone: None,
        pushdeer_token: None,
    }
}

fn new_app(app_id: &str) -> CreateApp {
    CreateApp {
        app_id: app_id.to_string(),
        name: "Reports".to_string(),
        description: "Monthly reports".to_string(),
        url: "https://reports.internal".to_string(),
        required_role: None,
        is_active: None,
    }
}

#[tokio::test]
async fn create_user_forces_user_role_and_audits() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;

    let user = app
        .state
        .admin
        .create_user(admin.user_id, new_user("carol"), &client())
        .await
        .unwrap();
    assert_eq!(user.role, Role::User);

    let err = app
        .state
        .admin
        .create_user(admin.user_id, new_user("carol"), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UsernameTaken));

    let (records, total) = app.store.list_audit(0, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(records[0].action, AuditAction::CreateUser);
    assert_eq!(records[0].operator_id, Some(admin.user_id));
    assert_eq!(records[0].ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn admin_cannot_demote_themselves() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;

    let err = app
        .state
        .admin
        .update_user(
            admin.user_id,
            admin.user_id,
            UpdateUser {
                role: Some(Role::Trusted),
                ..Default::default()
            },
            &client(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SelfModification(_)));

    let stored = app.store.find_user_by_id(admin.user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Admin);
}

#[tokio::test]
async fn update_user_changes_role_and_rejects_taken_username() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;
    let user = app.add_user("dave", Role::User).await;
    app.add_user("erin", Role::User).await;

    let updated = app
        .state
        .admin
        .update_user(
            admin.user_id,
            user.user_id,
            UpdateUser {
                role: Some(Role::Trusted),
                phone: Some("+15550123".to_string()),
                ..Default::default()
            },
            &client(),
        )
        .await
        .unwrap();
    assert_eq!(updated.role, Role::Trusted);
    assert_eq!(updated.phone.as_deref(), Some("+15550123"));

    let err = app
        .state
        .admin
        .update_user(
            admin.user_id,
            user.user_id,
            UpdateUser {
                username: Some("erin".to_string()),
                ..Default::default()
            },
            &client(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UsernameTaken));
}

#[tokio::test]
async fn update_user_password_is_rehashed() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;
    let user = app.add_user("dave", Role::User).await;

    app.state
        .admin
        .update_user(
            admin.user_id,
            user.user_id,
            UpdateUser {
                password: Some(Password::new("rotated-pass")),
                ..Default::default()
            },
            &client(),
        )
        .await
        .unwrap();

    assert!(app
        .state
        .identity
        .login("dave", &Password::new("rotated-pass"))
        .await
        .is_ok());
}

#[tokio::test]
async fn remove_user_is_soft_and_not_self() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;
    let user = app.add_user("frank", Role::User).await;

    let err = app
        .state
        .admin
        .remove_user(admin.user_id, admin.user_id, &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SelfModification(_)));

    app.state
        .admin
        .remove_user(admin.user_id, user.user_id, &client())
        .await
        .unwrap();

    assert!(app.store.find_user_by_id(user.user_id).await.unwrap().is_none());

    // The username stays reserved after removal.
    let err = app
        .state
        .admin
        .create_user(admin.user_id, new_user("frank"), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UsernameTaken));

    let (records, _) = app.store.list_audit(0, 10).await.unwrap();
    assert!(records.iter().any(|r| r.action == AuditAction::DeleteUser));
}

#[tokio::test]
async fn invite_code_lifecycle() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;

    let invite = app.state.admin.generate_invite_code().await.unwrap();
    assert_eq!(invite.code.len(), 22);

    let page = app
        .state
        .admin
        .list_invite_codes(Pagination::new(None, None, 20))
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    app.state
        .admin
        .delete_invite_code(admin.user_id, &invite.code, &client())
        .await
        .unwrap();

    let err = app
        .state
        .admin
        .delete_invite_code(admin.user_id, &invite.code, &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InviteNotFound));
}

#[tokio::test]
async fn redeemed_invite_cannot_be_deleted() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;
    let invite = app.state.admin.generate_invite_code().await.unwrap();

    app.state
        .identity
        .register(nkey_service::services::RegisterInput {
            username: "gina".to_string(),
            password: Password::new("gina-pass-1"),
            invite_code: invite.code.clone(),
            phone: None,
            pushdeer_token: None,
        })
        .await
        .unwrap();

    let err = app
        .state
        .admin
        .delete_invite_code(admin.user_id, &invite.code, &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InviteAlreadyUsed));
}

#[tokio::test]
async fn app_lifecycle_create_update_toggle() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;

    let created = app
        .state
        .admin
        .create_app(admin.user_id, new_app("reports"), &client())
        .await
        .unwrap();
    assert!(created.is_active);
    assert_eq!(created.required_role, Role::User);
    assert!(!created.secret_key.is_empty());

    let err = app
        .state
        .admin
        .create_app(admin.user_id, new_app("reports"), &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AppAlreadyExists));

    let updated = app
        .state
        .admin
        .update_app(
            admin.user_id,
            "reports",
            UpdateApp {
                required_role: Some(Role::Trusted),
                rotate_secret: true,
                ..Default::default()
            },
            &client(),
        )
        .await
        .unwrap();
    assert_eq!(updated.required_role, Role::Trusted);
    assert_eq!(updated.name, "Reports");
    assert_ne!(updated.secret_key, created.secret_key);

    let toggled = app
        .state
        .admin
        .toggle_app(admin.user_id, "reports", &client())
        .await
        .unwrap();
    assert!(!toggled.is_active);

    let err = app
        .state
        .admin
        .toggle_app(admin.user_id, "missing", &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AppNotFound));

    let (records, _) = app.store.list_audit(0, 20).await.unwrap();
    assert!(records.iter().any(|r| r.action == AuditAction::ToggleAppStatus));
}

#[tokio::test]
async fn access_override_upserts_and_takes_effect() {
    let app = TestApp::spawn();
    let admin = app.add_user("root", Role::Admin).await;
    let user = app.add_user("hank", Role::User).await;
    app.add_app("A", Role::User).await;

    let set = |enabled: bool| SetAccessOverride {
        user_id: user.user_id,
        app_id: "A".to_string(),
        enabled,
        valid_until: Some(Utc::now() + Duration::days(1)),
        custom_limit: Some(serde_json::json!({ "daily": 50 })),
    };

    app.state
        .admin
        .set_access_override(admin.user_id, set(false), &client())
        .await
        .unwrap();
    let err = app
        .state
        .nkeys
        .issue(user.user_id, user.role, &["A".to_string()], &client())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ScopeForbidden(_)));

    app.state
        .admin
        .set_access_override(admin.user_id, set(true), &client())
        .await
        .unwrap();
    assert!(app
        .state
        .nkeys
        .issue(user.user_id, user.role, &["A".to_string()], &client())
        .await
        .is_ok());

    let overrides = app.state.admin.list_user_overrides(user.user_id).await.unwrap();
    assert_eq!(overrides.len(), 1);
    assert!(overrides[0].enabled);

    let err = app
        .state
        .admin
        .set_access_override(
            admin.user_id,
            SetAccessOverride {
                app_id: "missing".to_string(),
                ..set(true)
            },
            &client(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AppNotFound));
}

#[tokio::test]
async fn user_listing_is_paginated() {
    let app = TestApp::spawn();
    for i in 0..12 {
        app.add_user(&format!("user{i:02}"), Role::User).await;
    }

    let first = app
        .state
        .admin
        .list_users(Pagination::new(Some(1), Some(5), 10))
        .await
        .unwrap();
    assert_eq!(first.total, 12);
    assert_eq!(first.items.len(), 5);

    let last = app
        .state
        .admin
        .list_users(Pagination::new(Some(3), Some(5), 10))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 2);

    let defaulted = app
        .state
        .admin
        .list_users(Pagination::new(Some(0), Some(500), 10))
        .await
        .unwrap();
    assert_eq!(defaulted.page, 1);
    assert_eq!(defaulted.size, 10);
    assert_eq!(defaulted.items.len(), 10);
}
