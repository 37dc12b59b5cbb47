//! Administrative lifecycle operations on identities, invite codes, apps
//! and access overrides.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::audit;
use super::random::{generate_app_secret, generate_invite_code, RandomSource};
use super::store::{CredentialStore, InviteDeletion};
use super::ServiceError;
use crate::models::{
    AccessOverride, App, AuditAction, AuditRecord, ClientMeta, InviteCode, Role, User,
};
use crate::utils::{hash_password, Password};

pub const MAX_PAGE_SIZE: i64 = 100;

/// One page of a listing plus the total row count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

/// Normalised paging request. Pages start at 1; a size outside
/// `1..=MAX_PAGE_SIZE` falls back to the listing's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, size: Option<i64>, default_size: i64) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let size = size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(default_size);
        Self { page, size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.size)
    }

    fn wrap<T>(&self, (items, total): (Vec<T>, i64)) -> Page<T> {
        Page {
            items,
            total,
            page: self.page,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password: Password,
    pub phone: Option<String>,
    pub pushdeer_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<Password>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub pushdeer_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateApp {
    pub app_id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub required_role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateApp {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub required_role: Option<Role>,
    pub is_active: Option<bool>,
    /// Replace the secret with a freshly generated one.
    pub rotate_secret: bool,
}

#[derive(Debug, Clone)]
pub struct SetAccessOverride {
    pub user_id: Uuid,
    pub app_id: String,
    pub enabled: bool,
    pub valid_until: Option<DateTime<Utc>>,
    pub custom_limit: Option<serde_json::Value>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn CredentialStore>,
    random: Arc<dyn RandomSource>,
}

impl AdminService {
    pub fn new(store: Arc<dyn CredentialStore>, random: Arc<dyn RandomSource>) -> Self {
        Self { store, random }
    }

    // ==================== Users ====================

    /// Creates an identity without an invite. The role is always `User`.
    pub async fn create_user(
        &self,
        operator: Uuid,
        req: CreateUser,
        client: &ClientMeta,
    ) -> Result<User, ServiceError> {
        if self
            .store
            .find_user_by_username(&req.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::UsernameTaken);
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;
        let user = User::new(req.username, password_hash.into_string(), Role::User)
            .with_contact(req.phone, req.pushdeer_token);

        self.store.insert_user(&user).await?;
        tracing::info!(operator = %operator, user_id = %user.user_id, "User created by admin");

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(AuditAction::CreateUser, "user", user.user_id.to_string())
                .operator(operator)
                .client(client)
                .details(format!("username={}", user.username)),
        )
        .await;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn list_users(&self, paging: Pagination) -> Result<Page<User>, ServiceError> {
        let rows = self.store.list_users(paging.offset(), paging.size).await?;
        Ok(paging.wrap(rows))
    }

    pub async fn update_user(
        &self,
        operator: Uuid,
        user_id: Uuid,
        req: UpdateUser,
        client: &ClientMeta,
    ) -> Result<User, ServiceError> {
        let mut user = self.get_user(user_id).await?;
        let mut changed = Vec::new();

        if let Some(username) = non_empty(req.username) {
            if username != user.username {
                if self.store.find_user_by_username(&username).await?.is_some() {
                    return Err(ServiceError::UsernameTaken);
                }
                user.username = username;
                changed.push("username");
            }
        }

        if let Some(password) = req.password.filter(|p| !p.as_str().is_empty()) {
            user.password_hash = hash_password(&password)
                .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?
                .into_string();
            changed.push("password");
        }

        if let Some(role) = req.role {
            if operator == user_id && user.role == Role::Admin && role != Role::Admin {
                return Err(ServiceError::SelfModification(
                    "Cannot demote your own admin privileges".to_string(),
                ));
            }
            if role != user.role {
                user.role = role;
                changed.push("role");
            }
        }

        if let Some(phone) = non_empty(req.phone) {
            user.phone = Some(phone);
            changed.push("phone");
        }

        if let Some(token) = non_empty(req.pushdeer_token) {
            user.pushdeer_token = Some(token);
            changed.push("pushdeer_token");
        }

        user.updated_utc = Utc::now();
        self.store.save_user(&user).await?;

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(AuditAction::UpdateUser, "user", user_id.to_string())
                .operator(operator)
                .client(client)
                .details(format!("fields={}", changed.join(","))),
        )
        .await;

        Ok(user)
    }

    /// Soft removal. The row stays for token and audit history.
    pub async fn remove_user(
        &self,
        operator: Uuid,
        user_id: Uuid,
        client: &ClientMeta,
    ) -> Result<(), ServiceError> {
        if operator == user_id {
            return Err(ServiceError::SelfModification(
                "Cannot delete your own account".to_string(),
            ));
        }

        let mut user = self.get_user(user_id).await?;
        let now = Utc::now();
        user.deleted_utc = Some(now);
        user.updated_utc = now;
        self.store.save_user(&user).await?;

        tracing::info!(operator = %operator, %user_id, "User removed");

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(AuditAction::DeleteUser, "user", user_id.to_string())
                .operator(operator)
                .client(client)
                .details(format!("username={}", user.username)),
        )
        .await;

        Ok(())
    }

    pub async fn list_user_overrides(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AccessOverride>, ServiceError> {
        self.get_user(user_id).await?;
        Ok(self.store.list_access_overrides_for_user(user_id).await?)
    }

    // ==================== Invite codes ====================

    pub async fn generate_invite_code(&self) -> Result<InviteCode, ServiceError> {
        let code = generate_invite_code(self.random.as_ref())?;
        let invite = InviteCode::new(code);
        self.store.insert_invite_code(&invite).await?;
        tracing::info!("Invite code generated");
        Ok(invite)
    }

    pub async fn list_invite_codes(
        &self,
        paging: Pagination,
    ) -> Result<Page<InviteCode>, ServiceError> {
        let rows = self
            .store
            .list_invite_codes(paging.offset(), paging.size)
            .await?;
        Ok(paging.wrap(rows))
    }

    /// Only unredeemed codes can be deleted.
    pub async fn delete_invite_code(
        &self,
        operator: Uuid,
        code: &str,
        client: &ClientMeta,
    ) -> Result<(), ServiceError> {
        match self.store.delete_unused_invite_code(code).await? {
            InviteDeletion::NotFound => Err(ServiceError::InviteNotFound),
            InviteDeletion::AlreadyRedeemed => Err(ServiceError::InviteAlreadyUsed),
            InviteDeletion::Deleted => {
                audit::record(
                    self.store.as_ref(),
                    AuditRecord::new(AuditAction::DeleteInviteCode, "invite_code", code)
                        .operator(operator)
                        .client(client),
                )
                .await;
                Ok(())
            }
        }
    }

    // ==================== Apps ====================

    /// Registers an app. The returned record carries the generated secret;
    /// listings never do.
    pub async fn create_app(
        &self,
        operator: Uuid,
        req: CreateApp,
        client: &ClientMeta,
    ) -> Result<App, ServiceError> {
        let app_id = req.app_id.trim().to_string();
        if app_id.is_empty() {
            return Err(ServiceError::ValidationError("app_id is required".to_string()));
        }
        if self.store.find_app(&app_id).await?.is_some() {
            return Err(ServiceError::AppAlreadyExists);
        }

        let secret = generate_app_secret(self.random.as_ref())?;
        let mut app = App::new(
            app_id,
            req.name,
            secret,
            req.required_role.unwrap_or_default(),
        )
        .with_details(req.description, req.url);
        app.is_active = req.is_active.unwrap_or(true);

        self.store.insert_app(&app).await?;
        tracing::info!(operator = %operator, app_id = %app.app_id, "App created");

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(AuditAction::CreateApp, "app", app.app_id.clone())
                .operator(operator)
                .client(client)
                .details(format!("required_role={}", app.required_role)),
        )
        .await;

        Ok(app)
    }

    pub async fn get_app(&self, app_id: &str) -> Result<App, ServiceError> {
        self.store
            .find_app(app_id)
            .await?
            .ok_or(ServiceError::AppNotFound)
    }

    pub async fn list_apps(&self) -> Result<Vec<App>, ServiceError> {
        Ok(self.store.list_apps().await?)
    }

    pub async fn update_app(
        &self,
        operator: Uuid,
        app_id: &str,
        req: UpdateApp,
        client: &ClientMeta,
    ) -> Result<App, ServiceError> {
        let mut app = self.get_app(app_id).await?;

        if let Some(name) = non_empty(req.name) {
            app.name = name;
        }
        if let Some(description) = non_empty(req.description) {
            app.description = description;
        }
        if let Some(url) = non_empty(req.url) {
            app.url = url;
        }
        if let Some(role) = req.required_role {
            app.required_role = role;
        }
        if let Some(active) = req.is_active {
            app.is_active = active;
        }
        if req.rotate_secret {
            app.secret_key = generate_app_secret(self.random.as_ref())?;
        }
        app.updated_utc = Utc::now();

        self.store.save_app(&app).await?;

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(AuditAction::UpdateApp, "app", app_id)
                .operator(operator)
                .client(client)
                .details(if req.rotate_secret { "secret rotated" } else { "" }),
        )
        .await;

        Ok(app)
    }

    /// Flips `is_active`. Deactivated apps keep their history and tokens but
    /// can no longer be requested.
    pub async fn toggle_app(
        &self,
        operator: Uuid,
        app_id: &str,
        client: &ClientMeta,
    ) -> Result<App, ServiceError> {
        let mut app = self.get_app(app_id).await?;
        app.is_active = !app.is_active;
        app.updated_utc = Utc::now();
        self.store.save_app(&app).await?;

        tracing::info!(operator = %operator, %app_id, is_active = app.is_active, "App status toggled");

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(AuditAction::ToggleAppStatus, "app", app_id)
                .operator(operator)
                .client(client)
                .details(format!("is_active={}", app.is_active)),
        )
        .await;

        Ok(app)
    }

    // ==================== Access overrides ====================

    pub async fn set_access_override(
        &self,
        operator: Uuid,
        req: SetAccessOverride,
        client: &ClientMeta,
    ) -> Result<AccessOverride, ServiceError> {
        self.get_user(req.user_id).await?;
        self.get_app(&req.app_id).await?;

        let now = Utc::now();
        let entry = match self
            .store
            .find_access_override(req.user_id, &req.app_id)
            .await?
        {
            Some(mut existing) => {
                existing.enabled = req.enabled;
                existing.valid_until = req.valid_until;
                existing.custom_limit = req.custom_limit;
                existing.updated_utc = now;
                existing
            }
            None => {
                let mut entry = AccessOverride::new(req.user_id, req.app_id, req.enabled);
                entry.valid_until = req.valid_until;
                entry.custom_limit = req.custom_limit;
                entry
            }
        };

        self.store.upsert_access_override(&entry).await?;

        audit::record(
            self.store.as_ref(),
            AuditRecord::new(
                AuditAction::SetAccessOverride,
                "access_override",
                format!("{}:{}", entry.user_id, entry.app_id),
            )
            .operator(operator)
            .client(client)
            .details(format!(
                "enabled={} valid_until={}",
                entry.enabled,
                entry
                    .valid_until
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "none".to_string())
            )),
        )
        .await;

        Ok(entry)
    }

    // ==================== Audit ====================

    pub async fn list_audit(&self, paging: Pagination) -> Result<Page<AuditRecord>, ServiceError> {
        let rows = self.store.list_audit(paging.offset(), paging.size).await?;
        Ok(paging.wrap(rows))
    }
}
