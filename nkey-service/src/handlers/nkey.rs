//! NKey issuance and validation endpoints.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::nkey::{
    GenerateNKeyRequest, GenerateNKeyResponse, ValidateNKeyRequest, ValidateNKeyResponse,
};
use crate::dtos::ErrorResponse;
use crate::middleware::{AuthUser, ClientInfo};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Issue an NKey scoped to the requested apps
#[utoipa::path(
    post,
    path = "/api/v1/nkey/generate",
    request_body = GenerateNKeyRequest,
    responses(
        (status = 200, description = "NKey issued", body = GenerateNKeyResponse),
        (status = 400, description = "Unknown or inactive app", body = ErrorResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse),
        (status = 403, description = "No permission for a requested app", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "NKey",
    security(("bearer_auth" = []))
)]
pub async fn generate(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    ValidatedJson(req): ValidatedJson<GenerateNKeyRequest>,
) -> Result<Json<GenerateNKeyResponse>, AppError> {
    let issued = state
        .nkeys
        .issue(auth.user_id, auth.role, &req.app_ids, &client)
        .await?;

    Ok(Json(issued.into()))
}

/// Check an NKey against an app (called by downstream apps)
#[utoipa::path(
    post,
    path = "/api/v1/nkey/validate",
    request_body = ValidateNKeyRequest,
    responses(
        (status = 200, description = "NKey is valid for the app", body = ValidateNKeyResponse),
        (status = 401, description = "Invalid or expired nkey", body = ErrorResponse),
        (status = 403, description = "NKey is not valid for this app", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "NKey"
)]
pub async fn validate(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ValidateNKeyRequest>,
) -> Result<Json<ValidateNKeyResponse>, AppError> {
    let validation = state.nkeys.validate(&req.nkey, &req.app_id).await?;
    Ok(Json(validation.into()))
}
