//! NKey model - short-lived capability tokens scoped to a set of apps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Ordered, duplicate-free list of app ids bound to a token.
///
/// Order is the order of first appearance in the request. The set is fixed
/// once the token is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AppIdSet(Vec<String>);

impl AppIdSet {
    pub fn from_requested<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self(out)
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.0.iter().any(|id| id == app_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Storage encoding: a JSON array of strings.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let ids: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::from_requested(ids))
    }
}

#[derive(Debug, Clone)]
pub struct NKey {
    pub nkey_id: Uuid,
    pub key_value: String,
    pub user_id: Uuid,
    pub app_ids: AppIdSet,
    pub expires_utc: DateTime<Utc>,
    pub first_used_utc: Option<DateTime<Utc>>,
    pub first_used_app: Option<String>,
    pub is_used: bool,
    pub created_utc: DateTime<Utc>,
}

impl NKey {
    pub fn new(
        key_value: String,
        user_id: Uuid,
        app_ids: AppIdSet,
        issued_at: DateTime<Utc>,
        expires_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            nkey_id: Uuid::new_v4(),
            key_value,
            user_id,
            app_ids,
            expires_utc,
            first_used_utc: None,
            first_used_app: None,
            is_used: false,
            created_utc: issued_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_utc
    }

    /// Short, non-secret prefix used when a token has to appear in logs.
    pub fn log_prefix(&self) -> &str {
        log_prefix(&self.key_value)
    }
}

pub fn log_prefix(key_value: &str) -> &str {
    let end = key_value
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(key_value.len());
    &key_value[..end]
}
