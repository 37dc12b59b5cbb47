//! Bootstrap data: the default app catalogue, an admin identity and a batch
//! of invite codes. Every step is safe to re-run.

use crate::models::{App, InviteCode, Role, User};
use crate::services::random::{generate_app_secret, generate_invite_code};
use crate::services::{CredentialStore, RandomSource, ServiceError, StoreError};
use crate::utils::{hash_password, Password};

struct DefaultApp {
    app_id: &'static str,
    name: &'static str,
    description: &'static str,
    required_role: Role,
}

const DEFAULT_APPS: &[DefaultApp] = &[
    DefaultApp {
        app_id: "searchall",
        name: "Search All",
        description: "Global search functionality",
        required_role: Role::User,
    },
    DefaultApp {
        app_id: "segaasstes",
        name: "Sega Assets",
        description: "Sega assets management",
        required_role: Role::User,
    },
    DefaultApp {
        app_id: "dxprender",
        name: "DXP Render",
        description: "DXP rendering service",
        required_role: Role::User,
    },
    DefaultApp {
        app_id: "CardPreview",
        name: "Card Preview",
        description: "Card preview functionality",
        required_role: Role::User,
    },
    DefaultApp {
        app_id: "livecontent_basic",
        name: "Live Content Basic",
        description: "Basic live content access",
        required_role: Role::User,
    },
    DefaultApp {
        app_id: "advanced_analytics",
        name: "Advanced Analytics",
        description: "Advanced analytics and reporting tools",
        required_role: Role::Trusted,
    },
    DefaultApp {
        app_id: "livecontent_admin",
        name: "Live Content Admin",
        description: "Administrative live content access",
        required_role: Role::Admin,
    },
];

/// Inserts any default app that is not registered yet. Returns the ids that
/// were created.
pub async fn seed_default_apps(
    store: &dyn CredentialStore,
    random: &dyn RandomSource,
) -> Result<Vec<String>, ServiceError> {
    let mut created = Vec::new();

    for default in DEFAULT_APPS {
        if store.find_app(default.app_id).await?.is_some() {
            continue;
        }

        let app = App::new(
            default.app_id.to_string(),
            default.name.to_string(),
            generate_app_secret(random)?,
            default.required_role,
        )
        .with_details(default.description, "");

        match store.insert_app(&app).await {
            Ok(()) => {
                tracing::info!(app_id = %app.app_id, "Seeded app");
                created.push(app.app_id);
            }
            // Lost a race with a concurrent seed run.
            Err(StoreError::Duplicate(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(created)
}

/// Creates an Admin identity. `Ok(None)` when the username already exists.
pub async fn seed_admin(
    store: &dyn CredentialStore,
    username: &str,
    password: &Password,
) -> Result<Option<User>, ServiceError> {
    if store.find_user_by_username(username).await?.is_some() {
        tracing::info!(%username, "Admin already exists; skipping");
        return Ok(None);
    }

    let hash = hash_password(password)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;
    let admin = User::new(username.to_string(), hash.into_string(), Role::Admin);

    match store.insert_user(&admin).await {
        Ok(()) => {
            tracing::info!(user_id = %admin.user_id, %username, "Seeded admin");
            Ok(Some(admin))
        }
        Err(StoreError::Duplicate(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Generates `count` fresh invite codes.
pub async fn seed_invite_codes(
    store: &dyn CredentialStore,
    random: &dyn RandomSource,
    count: usize,
) -> Result<Vec<InviteCode>, ServiceError> {
    let mut codes = Vec::with_capacity(count);
    for _ in 0..count {
        let invite = InviteCode::new(generate_invite_code(random)?);
        store.insert_invite_code(&invite).await?;
        codes.push(invite);
    }
    tracing::info!(count = codes.len(), "Seeded invite codes");
    Ok(codes)
}
