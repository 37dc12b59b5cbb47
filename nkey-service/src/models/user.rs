//! User model - invite-gated identities.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Role;

/// Identity record. Not `Serialize`: the password hash must never leave
/// the service, so outward views go through [`UserResponse`].
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub pushdeer_token: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub deleted_utc: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            username,
            password_hash,
            role,
            phone: None,
            pushdeer_token: None,
            created_utc: now,
            updated_utc: now,
            last_login_utc: None,
            deleted_utc: None,
        }
    }

    pub fn with_contact(mut self, phone: Option<String>, pushdeer_token: Option<String>) -> Self {
        self.phone = phone.filter(|p| !p.is_empty());
        self.pushdeer_token = pushdeer_token.filter(|t| !t.is_empty());
        self
    }

    pub fn is_removed(&self) -> bool {
        self.deleted_utc.is_some()
    }

    /// Notification endpoint, if the user registered one.
    pub fn notification_endpoint(&self) -> Option<&str> {
        self.pushdeer_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    #[schema(example = "alice")]
    pub username: String,
    pub role: Role,
    pub phone: Option<String>,
    pub has_pushdeer_token: bool,
    pub created_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            role: user.role,
            phone: user.phone.clone(),
            has_pushdeer_token: user.notification_endpoint().is_some(),
            created_utc: user.created_utc,
            last_login_utc: user.last_login_utc,
        }
    }
}
