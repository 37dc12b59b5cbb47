//! NKey issuance and validation.
//!
//! A token moves `Active -> Expired` with time and `unused -> used` on its
//! first successful validation. A used token keeps validating for its apps
//! until it expires.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::audit;
use super::notifier::{self, Notifier};
use super::policy::AccessPolicy;
use super::random::{generate_nkey_value, RandomSource};
use super::store::CredentialStore;
use super::ServiceError;
use crate::models::{AppIdSet, AuditAction, AuditRecord, ClientMeta, NKey, Role};

#[derive(Debug, Clone)]
pub struct IssuedNKey {
    pub nkey: String,
    pub apps: AppIdSet,
    pub expires_in: i64,
    pub expires_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NKeyValidation {
    pub username: String,
    pub role: Role,
    /// `true` when this call recorded the token's first use.
    pub first_use: bool,
}

#[derive(Clone)]
pub struct NKeyService {
    store: Arc<dyn CredentialStore>,
    policy: AccessPolicy,
    random: Arc<dyn RandomSource>,
    notifier: Arc<dyn Notifier>,
    ttl_seconds: i64,
}

impl NKeyService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        random: Arc<dyn RandomSource>,
        notifier: Arc<dyn Notifier>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            policy: AccessPolicy::new(store.clone()),
            store,
            random,
            notifier,
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ServiceError> {
        Duration::try_seconds(self.ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!(
                    "NKey lifetime of {}s is out of range",
                    self.ttl_seconds
                ))
            })
    }

    /// Issues a token scoped to `requested` apps.
    ///
    /// Every app is checked in request order before anything is written;
    /// the first failing app id is reported. A key-value collision is
    /// reported as an error and never overwrites the existing token.
    pub async fn issue(
        &self,
        user_id: Uuid,
        role: Role,
        requested: &[String],
        client: &ClientMeta,
    ) -> Result<IssuedNKey, ServiceError> {
        if requested.is_empty() {
            return Err(ServiceError::ValidationError(
                "app_ids must contain at least one id".to_string(),
            ));
        }
        if let Some(bad) = requested
            .iter()
            .find(|id| id.is_empty() || id.trim() != id.as_str())
        {
            return Err(ServiceError::ValidationError(format!(
                "app id {:?} is empty or padded with whitespace",
                bad
            )));
        }
        let apps = AppIdSet::from_requested(requested.iter().map(String::as_str));

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let now = Utc::now();
        for app_id in apps.iter() {
            let app = match self.store.find_app(app_id).await? {
                Some(app) if app.is_active => app,
                _ => return Err(ServiceError::UnknownOrInactiveApp(app_id.to_string())),
            };

            if !self.policy.may_grant(user_id, role, &app, now).await? {
                tracing::info!(%user_id, %app_id, role = %role, "NKey scope forbidden");
                return Err(ServiceError::ScopeForbidden(app_id.to_string()));
            }
        }

        let expires_utc = self.expiry_from(now)?;
        let key_value = generate_nkey_value(self.random.as_ref())?;
        let nkey = NKey::new(key_value, user_id, apps.clone(), now, expires_utc);

        self.store.create_nkey(&nkey).await.map_err(|e| {
            let err = ServiceError::from(e);
            if matches!(err, ServiceError::TokenCollision) {
                tracing::error!(%user_id, "NKey value collision; refusing to overwrite");
            }
            err
        })?;

        tracing::info!(
            %user_id,
            nkey = nkey.log_prefix(),
            apps = ?apps.as_slice(),
            expires_utc = %expires_utc,
            "NKey issued"
        );

        if let Some(endpoint) = user.notification_endpoint() {
            notifier::dispatch(
                self.notifier.clone(),
                endpoint.to_string(),
                notification_text(&nkey, self.ttl_seconds()),
            );
        }

        audit::record_detached(
            self.store.clone(),
            AuditRecord::new(AuditAction::NkeyIssued, "nkey", nkey.nkey_id.to_string())
                .operator(user_id)
                .client(client)
                .details(format!("apps={}", apps.as_slice().join(","))),
        );

        Ok(IssuedNKey {
            nkey: nkey.key_value,
            expires_in: self.ttl_seconds(),
            apps,
            expires_utc,
        })
    }

    /// Checks `key_value` against `app_id`: existence, then expiry, then scope.
    ///
    /// The first successful call records first use. Losing that race to a
    /// concurrent validation is not an error.
    pub async fn validate(
        &self,
        key_value: &str,
        app_id: &str,
    ) -> Result<NKeyValidation, ServiceError> {
        let nkey = self
            .store
            .find_nkey_by_value(key_value)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        let now = Utc::now();
        if nkey.is_expired(now) {
            tracing::debug!(nkey = nkey.log_prefix(), "NKey expired");
            return Err(ServiceError::TokenExpired);
        }

        if !nkey.app_ids.contains(app_id) {
            tracing::info!(nkey = nkey.log_prefix(), %app_id, "NKey scope denied");
            return Err(ServiceError::ScopeDenied);
        }

        let owner = self
            .store
            .find_user_by_id(nkey.user_id)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        let first_use = if nkey.is_used {
            false
        } else {
            self.store
                .mark_nkey_first_use(nkey.nkey_id, app_id, now)
                .await?
        };

        if first_use {
            tracing::info!(nkey = nkey.log_prefix(), %app_id, "NKey first use recorded");
        }

        Ok(NKeyValidation {
            username: owner.username,
            role: owner.role,
            first_use,
        })
    }
}

fn notification_text(nkey: &NKey, ttl_seconds: i64) -> String {
    format!(
        "{}\napps: {}\nexpires in {}s",
        nkey.key_value,
        nkey.app_ids.as_slice().join(", "),
        ttl_seconds
    )
}
