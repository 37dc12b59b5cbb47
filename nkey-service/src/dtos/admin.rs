use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{App, AppResponse, Role};
use crate::services::admin::{CreateApp, CreateUser, SetAccessOverride, UpdateApp, UpdateUser};
use crate::utils::validation::validate_username;
use crate::utils::Password;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 50, message = "Username must be 3-50 characters"),
        custom(function = "validate_username")
    )]
    #[schema(example = "bob")]
    pub username: String,

    #[validate(length(min = 6, max = 128, message = "Password must be 6-128 characters"))]
    #[schema(example = "initial-pass")]
    pub password: String,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[validate(length(max = 128))]
    pub pushdeer_token: Option<String>,
}

impl From<CreateUserRequest> for CreateUser {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            username: req.username,
            password: Password::new(req.password),
            phone: req.phone,
            pushdeer_token: req.pushdeer_token,
        }
    }
}

/// Empty or absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(max = 50), custom(function = "validate_username"))]
    pub username: Option<String>,

    #[validate(length(max = 128))]
    pub password: Option<String>,

    pub role: Option<Role>,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[validate(length(max = 128))]
    pub pushdeer_token: Option<String>,
}

impl From<UpdateUserRequest> for UpdateUser {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            username: req.username,
            password: req.password.map(Password::new),
            role: req.role,
            phone: req.phone,
            pushdeer_token: req.pushdeer_token,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAppRequest {
    #[validate(length(min = 1, max = 64, message = "app_id must be 1-64 characters"))]
    #[schema(example = "searchall")]
    pub app_id: String,

    #[validate(length(min = 1, max = 128, message = "name is required"))]
    #[schema(example = "Search All")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    #[validate(length(max = 512))]
    pub url: String,

    /// Defaults to `user`.
    pub required_role: Option<Role>,

    /// Defaults to `true`.
    pub is_active: Option<bool>,
}

impl From<CreateAppRequest> for CreateApp {
    fn from(req: CreateAppRequest) -> Self {
        Self {
            app_id: req.app_id,
            name: req.name,
            description: req.description,
            url: req.url,
            required_role: req.required_role,
            is_active: req.is_active,
        }
    }
}

/// Returned once on creation; the only response that carries the secret.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateAppResponse {
    #[serde(flatten)]
    pub app: AppResponse,
    pub secret_key: String,
}

impl From<App> for CreateAppResponse {
    fn from(app: App) -> Self {
        Self {
            app: AppResponse::from(&app),
            secret_key: app.secret_key,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAppRequest {
    #[validate(length(max = 128))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 512))]
    pub url: Option<String>,
    pub required_role: Option<Role>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub rotate_secret: bool,
}

impl From<UpdateAppRequest> for UpdateApp {
    fn from(req: UpdateAppRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            url: req.url,
            required_role: req.required_role,
            is_active: req.is_active,
            rotate_secret: req.rotate_secret,
        }
    }
}

/// Response for an update; carries the secret only when it was rotated.
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateAppResponse {
    #[serde(flatten)]
    pub app: AppResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetAccessOverrideRequest {
    pub user_id: uuid::Uuid,

    #[validate(length(min = 1, max = 64, message = "app_id is required"))]
    #[schema(example = "advanced_analytics")]
    pub app_id: String,

    #[schema(example = false)]
    pub enabled: bool,

    pub valid_until: Option<DateTime<Utc>>,

    #[schema(value_type = Option<Object>)]
    pub custom_limit: Option<serde_json::Value>,
}

impl From<SetAccessOverrideRequest> for SetAccessOverride {
    fn from(req: SetAccessOverrideRequest) -> Self {
        Self {
            user_id: req.user_id,
            app_id: req.app_id,
            enabled: req.enabled,
            valid_until: req.valid_until,
            custom_limit: req.custom_limit,
        }
    }
}
