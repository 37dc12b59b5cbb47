use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Role;
use crate::services::{IssuedNKey, NKeyValidation};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GenerateNKeyRequest {
    #[validate(length(min = 1, max = 32, message = "Between 1 and 32 app ids are required"))]
    #[schema(example = json!(["searchall", "dxprender"]))]
    pub app_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateNKeyResponse {
    #[schema(example = "TOUNET_q1Yx...")]
    pub nkey: String,
    #[schema(example = 900)]
    pub expires_in: i64,
    pub expires_utc: DateTime<Utc>,
    #[schema(example = json!(["searchall", "dxprender"]))]
    pub apps: Vec<String>,
}

impl From<IssuedNKey> for GenerateNKeyResponse {
    fn from(issued: IssuedNKey) -> Self {
        Self {
            nkey: issued.nkey,
            expires_in: issued.expires_in,
            expires_utc: issued.expires_utc,
            apps: issued.apps.as_slice().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateNKeyRequest {
    #[validate(length(min = 1, max = 256, message = "nkey is required"))]
    #[schema(example = "TOUNET_q1Yx...")]
    pub nkey: String,

    #[validate(length(min = 1, max = 64, message = "app_id is required"))]
    #[schema(example = "searchall")]
    pub app_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateNKeyResponse {
    #[schema(example = true)]
    pub valid: bool,
    #[schema(example = "alice")]
    pub username: String,
    pub user_role: Role,
}

impl From<NKeyValidation> for ValidateNKeyResponse {
    fn from(validation: NKeyValidation) -> Self {
        Self {
            valid: true,
            username: validation.username,
            user_role: validation.role,
        }
    }
}
