//! PostgreSQL adapter for [`CredentialStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::{CredentialStore, InviteDeletion, StoreError, UniqueField};
use crate::models::{AccessOverride, App, AppIdSet, AuditRecord, InviteCode, NKey, Role, User};

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "PostgreSQL call failed");
    StoreError::unavailable(err)
}

/// Unique violations become `Duplicate(field)`; anything else is an outage.
fn write_error(err: sqlx::Error, field: UniqueField) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(field);
        }
    }
    unavailable(err)
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    tracing::error!(column = what, %detail, "Stored value failed to decode");
    StoreError::unavailable(anyhow::anyhow!("corrupt {}: {}", what, detail))
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse().map_err(|e: String| corrupt("role", e))
}

// ==================== Row types ====================

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    username: String,
    password_hash: String,
    role: String,
    phone: Option<String>,
    pushdeer_token: Option<String>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
    last_login_utc: Option<DateTime<Utc>>,
    deleted_utc: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            user_id: row.user_id,
            username: row.username,
            password_hash: row.password_hash,
            role: parse_role(&row.role)?,
            phone: row.phone,
            pushdeer_token: row.pushdeer_token,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
            last_login_utc: row.last_login_utc,
            deleted_utc: row.deleted_utc,
        })
    }
}

#[derive(FromRow)]
struct InviteRow {
    code: String,
    created_utc: DateTime<Utc>,
    redeemed_by: Option<Uuid>,
    redeemed_utc: Option<DateTime<Utc>>,
}

impl From<InviteRow> for InviteCode {
    fn from(row: InviteRow) -> Self {
        InviteCode {
            code: row.code,
            created_utc: row.created_utc,
            redeemed_by: row.redeemed_by,
            redeemed_utc: row.redeemed_utc,
        }
    }
}

#[derive(FromRow)]
struct AppRow {
    app_id: String,
    name: String,
    description: String,
    url: String,
    secret_key: String,
    required_role: String,
    is_active: bool,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<AppRow> for App {
    type Error = StoreError;

    fn try_from(row: AppRow) -> Result<Self, Self::Error> {
        Ok(App {
            app_id: row.app_id,
            name: row.name,
            description: row.description,
            url: row.url,
            secret_key: row.secret_key,
            required_role: parse_role(&row.required_role)?,
            is_active: row.is_active,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(FromRow)]
struct OverrideRow {
    user_id: Uuid,
    app_id: String,
    enabled: bool,
    valid_until: Option<DateTime<Utc>>,
    custom_limit: Option<String>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<OverrideRow> for AccessOverride {
    type Error = StoreError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        let custom_limit = row
            .custom_limit
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt("custom_limit", e))?;
        Ok(AccessOverride {
            user_id: row.user_id,
            app_id: row.app_id,
            enabled: row.enabled,
            valid_until: row.valid_until,
            custom_limit,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(FromRow)]
struct NKeyRow {
    nkey_id: Uuid,
    key_value: String,
    user_id: Uuid,
    app_ids: String,
    expires_utc: DateTime<Utc>,
    first_used_utc: Option<DateTime<Utc>>,
    first_used_app: Option<String>,
    is_used: bool,
    created_utc: DateTime<Utc>,
}

impl TryFrom<NKeyRow> for NKey {
    type Error = StoreError;

    fn try_from(row: NKeyRow) -> Result<Self, Self::Error> {
        Ok(NKey {
            nkey_id: row.nkey_id,
            key_value: row.key_value,
            user_id: row.user_id,
            app_ids: AppIdSet::from_json(&row.app_ids).map_err(|e| corrupt("app_ids", e))?,
            expires_utc: row.expires_utc,
            first_used_utc: row.first_used_utc,
            first_used_app: row.first_used_app,
            is_used: row.is_used,
            created_utc: row.created_utc,
        })
    }
}

#[derive(FromRow)]
struct AuditRow {
    audit_id: Uuid,
    action: String,
    target_type: String,
    target_id: String,
    operator_id: Option<Uuid>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    details: String,
    created_utc: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditRecord {
            audit_id: row.audit_id,
            action: row.action.parse().map_err(|e: String| corrupt("action", e))?,
            target_type: row.target_type,
            target_id: row.target_id,
            operator_id: row.operator_id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            details: row.details,
            created_utc: row.created_utc,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const USER_COLUMNS: &str = "user_id, username, password_hash, role, phone, pushdeer_token, \
     created_utc, updated_utc, last_login_utc, deleted_utc";

const INSERT_USER: &str = r#"
    INSERT INTO users (user_id, username, password_hash, role, phone, pushdeer_token,
                       created_utc, updated_utc, last_login_utc, deleted_utc)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    // ==================== Users ====================

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1 AND deleted_utc IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_utc IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .map(User::try_from)
        .transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(INSERT_USER)
            .bind(user.user_id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.phone)
            .bind(&user.pushdeer_token)
            .bind(user.created_utc)
            .bind(user.updated_utc)
            .bind(user.last_login_utc)
            .bind(user.deleted_utc)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, UniqueField::Username))?;
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, role = $4, phone = $5, pushdeer_token = $6,
                updated_utc = $7, last_login_utc = $8, deleted_utc = $9
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.pushdeer_token)
        .bind(user.updated_utc)
        .bind(user.last_login_utc)
        .bind(user.deleted_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, UniqueField::Username))?;
        Ok(())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), StoreError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_utc IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_utc IS NULL \
             ORDER BY created_utc DESC, username ASC OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok((convert_all(rows)?, total))
    }

    async fn register_with_invite(
        &self,
        user: &User,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // The row lock taken here serialises concurrent redemptions of one code.
        let claimed = sqlx::query(
            r#"
            UPDATE invite_codes
            SET redeemed_by = $1, redeemed_utc = $2
            WHERE code = $3 AND redeemed_by IS NULL
            "#,
        )
        .bind(user.user_id)
        .bind(at)
        .bind(code)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(unavailable)?;
            return Err(StoreError::InviteUnavailable);
        }

        sqlx::query(INSERT_USER)
            .bind(user.user_id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.phone)
            .bind(&user.pushdeer_token)
            .bind(user.created_utc)
            .bind(user.updated_utc)
            .bind(user.last_login_utc)
            .bind(user.deleted_utc)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, UniqueField::Username))?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    // ==================== Invite codes ====================

    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>, StoreError> {
        let row = sqlx::query_as::<_, InviteRow>(
            "SELECT code, created_utc, redeemed_by, redeemed_utc FROM invite_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(InviteCode::from))
    }

    async fn insert_invite_code(&self, invite: &InviteCode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO invite_codes (code, created_utc, redeemed_by, redeemed_utc) VALUES ($1, $2, $3, $4)",
        )
        .bind(&invite.code)
        .bind(invite.created_utc)
        .bind(invite.redeemed_by)
        .bind(invite.redeemed_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, UniqueField::InviteCode))?;
        Ok(())
    }

    async fn delete_unused_invite_code(&self, code: &str) -> Result<InviteDeletion, StoreError> {
        let deleted =
            sqlx::query("DELETE FROM invite_codes WHERE code = $1 AND redeemed_by IS NULL")
                .bind(code)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;

        if deleted.rows_affected() > 0 {
            return Ok(InviteDeletion::Deleted);
        }

        match self.find_invite_code(code).await? {
            Some(_) => Ok(InviteDeletion::AlreadyRedeemed),
            None => Ok(InviteDeletion::NotFound),
        }
    }

    async fn list_invite_codes(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<InviteCode>, i64), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invite_codes")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;

        let rows = sqlx::query_as::<_, InviteRow>(
            r#"
            SELECT code, created_utc, redeemed_by, redeemed_utc FROM invite_codes
            ORDER BY created_utc DESC, code ASC OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok((rows.into_iter().map(InviteCode::from).collect(), total))
    }

    // ==================== Apps ====================

    async fn find_app(&self, app_id: &str) -> Result<Option<App>, StoreError> {
        sqlx::query_as::<_, AppRow>("SELECT * FROM apps WHERE app_id = $1")
            .bind(app_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .map(App::try_from)
            .transpose()
    }

    async fn insert_app(&self, app: &App) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO apps (app_id, name, description, url, secret_key, required_role,
                              is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&app.app_id)
        .bind(&app.name)
        .bind(&app.description)
        .bind(&app.url)
        .bind(&app.secret_key)
        .bind(app.required_role.as_str())
        .bind(app.is_active)
        .bind(app.created_utc)
        .bind(app.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, UniqueField::AppId))?;
        Ok(())
    }

    async fn save_app(&self, app: &App) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE apps
            SET name = $2, description = $3, url = $4, secret_key = $5, required_role = $6,
                is_active = $7, updated_utc = $8
            WHERE app_id = $1
            "#,
        )
        .bind(&app.app_id)
        .bind(&app.name)
        .bind(&app.description)
        .bind(&app.url)
        .bind(&app.secret_key)
        .bind(app.required_role.as_str())
        .bind(app.is_active)
        .bind(app.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn list_apps(&self) -> Result<Vec<App>, StoreError> {
        let rows = sqlx::query_as::<_, AppRow>("SELECT * FROM apps ORDER BY app_id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        convert_all(rows)
    }

    // ==================== Access overrides ====================

    async fn find_access_override(
        &self,
        user_id: Uuid,
        app_id: &str,
    ) -> Result<Option<AccessOverride>, StoreError> {
        sqlx::query_as::<_, OverrideRow>(
            "SELECT * FROM access_overrides WHERE user_id = $1 AND app_id = $2",
        )
        .bind(user_id)
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .map(AccessOverride::try_from)
        .transpose()
    }

    async fn upsert_access_override(&self, entry: &AccessOverride) -> Result<(), StoreError> {
        let custom_limit = entry
            .custom_limit
            .as_ref()
            .map(serde_json::Value::to_string);

        sqlx::query(
            r#"
            INSERT INTO access_overrides (user_id, app_id, enabled, valid_until, custom_limit,
                                          created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, app_id) DO UPDATE
            SET enabled = EXCLUDED.enabled,
                valid_until = EXCLUDED.valid_until,
                custom_limit = EXCLUDED.custom_limit,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.app_id)
        .bind(entry.enabled)
        .bind(entry.valid_until)
        .bind(custom_limit)
        .bind(entry.created_utc)
        .bind(entry.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn list_access_overrides_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AccessOverride>, StoreError> {
        let rows = sqlx::query_as::<_, OverrideRow>(
            "SELECT * FROM access_overrides WHERE user_id = $1 ORDER BY app_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        convert_all(rows)
    }

    // ==================== NKeys ====================

    async fn create_nkey(&self, nkey: &NKey) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO nkeys (nkey_id, key_value, user_id, app_ids, expires_utc,
                               first_used_utc, first_used_app, is_used, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(nkey.nkey_id)
        .bind(&nkey.key_value)
        .bind(nkey.user_id)
        .bind(nkey.app_ids.to_json())
        .bind(nkey.expires_utc)
        .bind(nkey.first_used_utc)
        .bind(&nkey.first_used_app)
        .bind(nkey.is_used)
        .bind(nkey.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, UniqueField::KeyValue))?;
        Ok(())
    }

    async fn find_nkey_by_value(&self, key_value: &str) -> Result<Option<NKey>, StoreError> {
        sqlx::query_as::<_, NKeyRow>("SELECT * FROM nkeys WHERE key_value = $1")
            .bind(key_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .map(NKey::try_from)
            .transpose()
    }

    async fn mark_nkey_first_use(
        &self,
        nkey_id: Uuid,
        app_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE nkeys
            SET is_used = TRUE, first_used_utc = $2, first_used_app = $3
            WHERE nkey_id = $1 AND is_used = FALSE
            "#,
        )
        .bind(nkey_id)
        .bind(at)
        .bind(app_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    // ==================== Audit ====================

    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (audit_id, action, target_type, target_id, operator_id,
                                    ip_address, user_agent, details, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.audit_id)
        .bind(record.action.as_str())
        .bind(&record.target_type)
        .bind(&record.target_id)
        .bind(record.operator_id)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(&record.details)
        .bind(record.created_utc)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn list_audit(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<AuditRecord>, i64), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;

        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM audit_logs ORDER BY created_utc DESC OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok((convert_all(rows)?, total))
    }
}
