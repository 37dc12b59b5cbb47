//! Access override model - per-user, per-app restrictions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessOverride {
    pub user_id: Uuid,
    pub app_id: String,
    pub enabled: bool,
    pub valid_until: Option<DateTime<Utc>>,
    /// Opaque to this service; stored and returned as given.
    #[schema(value_type = Option<Object>)]
    pub custom_limit: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl AccessOverride {
    pub fn new(user_id: Uuid, app_id: String, enabled: bool) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            app_id,
            enabled,
            valid_until: None,
            custom_limit: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| now > until)
    }
}
