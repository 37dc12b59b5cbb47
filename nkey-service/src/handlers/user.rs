//! Self-service profile endpoints.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::auth::{AllowedAppResponse, UpdateProfileRequest};
use crate::dtos::ErrorResponse;
use crate::middleware::AuthUser;
use crate::models::UserResponse;
use crate::services::identity::ProfileUpdate;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/user/me",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.identity.profile(auth.user_id).await?;
    Ok(Json(user.sanitized()))
}

/// Update the caller's phone and PushDeer token
#[utoipa::path(
    put,
    path = "/api/v1/user/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .identity
        .update_profile(
            auth.user_id,
            ProfileUpdate {
                phone: req.phone,
                pushdeer_token: req.pushdeer_token,
            },
        )
        .await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");
    Ok(Json(user.sanitized()))
}

/// Apps the caller's role qualifies for
#[utoipa::path(
    get,
    path = "/api/v1/user/apps",
    responses(
        (status = 200, description = "Apps visible to the caller", body = [AllowedAppResponse]),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn my_apps(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<AllowedAppResponse>>, AppError> {
    let apps = state.identity.allowed_apps(auth.user_id, auth.role).await?;
    Ok(Json(apps.into_iter().map(AllowedAppResponse::from).collect()))
}
