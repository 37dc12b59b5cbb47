use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::UserResponse;
use crate::services::Session;
use crate::utils::validation::validate_username;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 50, message = "Username must be 3-50 characters"),
        custom(function = "validate_username")
    )]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters"))]
    #[schema(example = "s3cret-pass", min_length = 6)]
    pub password: String,

    #[validate(length(min = 1, message = "Invite code is required"))]
    #[schema(example = "Yq3dVw0m3ZlX1g8s2bXy7A")]
    pub invite_code: String,

    #[validate(length(max = 32))]
    #[schema(example = "+8613800000000")]
    pub phone: Option<String>,

    #[validate(length(max = 128))]
    #[schema(example = "PDU1234TxyzABC")]
    pub pushdeer_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "s3cret-pass")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub session: Session,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 32))]
    #[schema(example = "+8613800000000")]
    pub phone: Option<String>,

    #[validate(length(max = 128))]
    #[schema(example = "PDU1234TxyzABC")]
    pub pushdeer_token: Option<String>,
}

/// An app visible to the caller, with any override that applies.
#[derive(Debug, Serialize, ToSchema)]
pub struct AllowedAppResponse {
    #[schema(example = "searchall")]
    pub app_id: String,
    #[schema(example = "Search All")]
    pub name: String,
    pub description: String,
    pub url: String,
    pub required_role: crate::models::Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_valid_until: Option<chrono::DateTime<chrono::Utc>>,
    /// `false` when an override currently blocks token issuance.
    pub usable: bool,
}

impl From<crate::services::identity::AllowedApp> for AllowedAppResponse {
    fn from(allowed: crate::services::identity::AllowedApp) -> Self {
        let app = allowed.app;
        Self {
            app_id: app.app_id,
            name: app.name,
            description: app.description,
            url: app.url,
            required_role: app.required_role,
            override_enabled: allowed.override_enabled,
            override_valid_until: allowed.override_valid_until,
            usable: allowed.usable,
        }
    }
}
