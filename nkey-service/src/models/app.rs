//! App model - downstream applications an NKey can be scoped to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::Role;

#[derive(Debug, Clone)]
pub struct App {
    pub app_id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    /// Shared secret handed to the app's operators once, on creation.
    pub secret_key: String,
    pub required_role: Role,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl App {
    pub fn new(app_id: String, name: String, secret_key: String, required_role: Role) -> Self {
        let now = Utc::now();
        Self {
            app_id,
            name,
            description: String::new(),
            url: String::new(),
            secret_key,
            required_role,
            is_active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn with_details(mut self, description: impl Into<String>, url: impl Into<String>) -> Self {
        self.description = description.into();
        self.url = url.into();
        self
    }
}

/// Outward view of an [`App`]; never carries the secret.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppResponse {
    #[schema(example = "searchall")]
    pub app_id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub required_role: Role,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<&App> for AppResponse {
    fn from(app: &App) -> Self {
        Self {
            app_id: app.app_id.clone(),
            name: app.name.clone(),
            description: app.description.clone(),
            url: app.url.clone(),
            required_role: app.required_role,
            is_active: app.is_active,
            created_utc: app.created_utc,
            updated_utc: app.updated_utc,
        }
    }
}
