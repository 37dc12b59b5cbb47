//! Registration and login.

use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::dtos::ErrorResponse;
use crate::services::{RegisterInput, Session};
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

/// Register with a single-use invite code
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Identity created and session issued", body = AuthResponse),
        (status = 400, description = "Invalid or already used invite code", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let registration = state
        .identity
        .register(RegisterInput {
            username: req.username,
            password: Password::new(req.password),
            invite_code: req.invite_code,
            phone: req.phone,
            pushdeer_token: req.pushdeer_token,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            session: registration.session,
            user: registration.user.sanitized(),
        }),
    ))
}

/// Exchange username and password for a session token
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = Session),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .identity
        .login(&req.username, &Password::new(req.password))
        .await?;

    Ok(Json(session))
}
