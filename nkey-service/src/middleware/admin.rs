use axum::{extract::Request, middleware::Next, response::Response};
use service_core::error::AppError;

use super::auth::AuthUser;
use crate::models::Role;

/// Must be layered inside `session_middleware`.
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .is_some_and(|user| user.role == Role::Admin);

    if !is_admin {
        tracing::warn!(path = %request.uri().path(), "Admin route refused");
        return Err(AppError::Forbidden(anyhow::anyhow!("Admin privileges required")));
    }

    Ok(next.run(request).await)
}
