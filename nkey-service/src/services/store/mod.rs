//! Storage boundary for identities, invite codes, apps, overrides, NKeys
//! and audit records.
//!
//! Every multi-step invariant (invite redemption, first-use recording,
//! key uniqueness) is enforced by a single call on this trait so that
//! adapters can make it atomic in whatever way their engine allows.

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AccessOverride, App, AuditRecord, InviteCode, NKey, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    KeyValue,
    AppId,
    InviteCode,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UniqueField::Username => "username",
            UniqueField::KeyValue => "nkey value",
            UniqueField::AppId => "app id",
            UniqueField::InviteCode => "invite code",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    #[error("duplicate {0}")]
    Duplicate(UniqueField),

    /// The invite code does not exist or was already redeemed.
    #[error("invite code unavailable")]
    InviteUnavailable,
}

impl StoreError {
    pub fn unavailable(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Unavailable(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteDeletion {
    Deleted,
    NotFound,
    AlreadyRedeemed,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Users. Lookups never return soft-removed identities.
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    async fn list_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), StoreError>;

    /// Claims `code` for `user` and inserts `user` as one atomic step.
    ///
    /// Fails with [`StoreError::InviteUnavailable`] when the code is missing
    /// or already redeemed, and nothing is written.
    async fn register_with_invite(
        &self,
        user: &User,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // Invite codes.
    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>, StoreError>;
    async fn insert_invite_code(&self, invite: &InviteCode) -> Result<(), StoreError>;
    async fn delete_unused_invite_code(&self, code: &str) -> Result<InviteDeletion, StoreError>;
    async fn list_invite_codes(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<InviteCode>, i64), StoreError>;

    // Apps.
    async fn find_app(&self, app_id: &str) -> Result<Option<App>, StoreError>;
    async fn insert_app(&self, app: &App) -> Result<(), StoreError>;
    async fn save_app(&self, app: &App) -> Result<(), StoreError>;
    async fn list_apps(&self) -> Result<Vec<App>, StoreError>;

    // Access overrides.
    async fn find_access_override(
        &self,
        user_id: Uuid,
        app_id: &str,
    ) -> Result<Option<AccessOverride>, StoreError>;
    async fn upsert_access_override(&self, entry: &AccessOverride) -> Result<(), StoreError>;
    async fn list_access_overrides_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AccessOverride>, StoreError>;

    // NKeys.
    /// Fails with `Duplicate(KeyValue)` rather than overwriting an existing token.
    async fn create_nkey(&self, nkey: &NKey) -> Result<(), StoreError>;
    async fn find_nkey_by_value(&self, key_value: &str) -> Result<Option<NKey>, StoreError>;
    /// Compare-and-swap on `is_used = false`. Returns whether this call won.
    async fn mark_nkey_first_use(
        &self,
        nkey_id: Uuid,
        app_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // Audit trail, newest first.
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;
    async fn list_audit(&self, offset: i64, limit: i64)
        -> Result<(Vec<AuditRecord>, i64), StoreError>;
}
