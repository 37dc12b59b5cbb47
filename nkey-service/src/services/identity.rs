use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::jwt::{JwtService, SessionClaims};
use super::policy::{decide, AccessDecision};
use super::store::CredentialStore;
use super::ServiceError;
use crate::models::{App, Role, User};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Verified against when the username is unknown, so that a miss costs the
/// same as a wrong password.
static DUMMY_HASH: Lazy<Option<PasswordHashString>> =
    Lazy::new(|| hash_password(&Password::new("nkey-dummy-password")).ok());

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub password: Password,
    pub invite_code: String,
    pub phone: Option<String>,
    pub pushdeer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Session {
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires.
    #[schema(example = 86400)]
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub session: Session,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub pushdeer_token: Option<String>,
}

/// An app the user's role qualifies for, with any override on record.
#[derive(Debug, Clone)]
pub struct AllowedApp {
    pub app: App,
    pub override_enabled: Option<bool>,
    pub override_valid_until: Option<chrono::DateTime<Utc>>,
    pub usable: bool,
}

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn CredentialStore>,
    jwt: JwtService,
}

impl IdentityService {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    /// Creates a `User`-role identity, consuming `invite_code`.
    ///
    /// The invite is checked before the username so a spent code is always
    /// reported as such. Claiming the code and inserting the user happen in
    /// one store call; concurrent registrations on one code yield one winner.
    pub async fn register(&self, input: RegisterInput) -> Result<Registration, ServiceError> {
        match self.store.find_invite_code(&input.invite_code).await? {
            Some(invite) if !invite.is_redeemed() => {}
            _ => return Err(ServiceError::InvalidInvite),
        }

        if self
            .store
            .find_user_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::UsernameTaken);
        }

        let password_hash = hash_password(&input.password).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let user = User::new(input.username, password_hash.into_string(), Role::User)
            .with_contact(input.phone, input.pushdeer_token);

        self.store
            .register_with_invite(&user, &input.invite_code, Utc::now())
            .await?;

        tracing::info!(user_id = %user.user_id, username = %user.username, "User registered");

        let session = self.issue_session(&user)?;
        Ok(Registration { user, session })
    }

    pub async fn login(&self, username: &str, password: &Password) -> Result<Session, ServiceError> {
        let Some(mut user) = self.store.find_user_by_username(username).await? else {
            if let Some(dummy) = DUMMY_HASH.as_ref() {
                let _ = verify_password(password, dummy);
            }
            tracing::info!("Login failed: unknown username");
            return Err(ServiceError::InvalidCredentials);
        };

        verify_password(password, &PasswordHashString::new(user.password_hash.clone()))
            .map_err(|_| {
                tracing::info!(user_id = %user.user_id, "Login failed: wrong password");
                ServiceError::InvalidCredentials
            })?;

        let now = Utc::now();
        user.last_login_utc = Some(now);
        user.updated_utc = now;
        self.store.save_user(&user).await?;

        tracing::info!(user_id = %user.user_id, "User logged in");
        self.issue_session(&user)
    }

    pub fn issue_session(&self, user: &User) -> Result<Session, ServiceError> {
        let token = self
            .jwt
            .generate_session_token(user)
            .map_err(ServiceError::Internal)?;

        Ok(Session {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.session_expiry_seconds(),
        })
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        self.jwt.validate_session_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Session rejected");
            ServiceError::InvalidSession
        })
    }

    /// Resolves a session token to the live identity behind it. A removed
    /// identity invalidates its outstanding sessions.
    pub async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        let claims = self.verify_session(token)?;
        let user_id = claims.user_id().ok_or(ServiceError::InvalidSession)?;
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::InvalidSession)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    /// Updates contact fields. Absent or empty fields keep their value.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, ServiceError> {
        let mut user = self.profile(user_id).await?;

        if let Some(phone) = update.phone.filter(|p| !p.is_empty()) {
            user.phone = Some(phone);
        }
        if let Some(token) = update.pushdeer_token.filter(|t| !t.is_empty()) {
            user.pushdeer_token = Some(token);
        }
        user.updated_utc = Utc::now();

        self.store.save_user(&user).await?;
        Ok(user)
    }

    /// Active apps whose role gate the user passes, with override details.
    pub async fn allowed_apps(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> Result<Vec<AllowedApp>, ServiceError> {
        let now = Utc::now();
        let overrides = self.store.list_access_overrides_for_user(user_id).await?;

        let allowed = self
            .store
            .list_apps()
            .await?
            .into_iter()
            .filter(|app| app.is_active)
            .filter_map(|app| {
                let entry = overrides.iter().find(|o| o.app_id == app.app_id);
                match decide(role, &app, entry, now) {
                    AccessDecision::RoleDenied(_) => None,
                    decision => Some(AllowedApp {
                        override_enabled: entry.map(|o| o.enabled),
                        override_valid_until: entry.and_then(|o| o.valid_until),
                        usable: decision.is_granted(),
                        app,
                    }),
                }
            })
            .collect();

        Ok(allowed)
    }
}
