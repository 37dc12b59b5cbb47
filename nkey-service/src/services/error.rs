use service_core::error::AppError;
use thiserror::Error;

use super::random::RandomError;
use super::store::{StoreError, UniqueField};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid or already used invite code")]
    InvalidInvite,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Unknown or inactive app: {0}")]
    UnknownOrInactiveApp(String),

    #[error("No permission for app: {0}")]
    ScopeForbidden(String),

    #[error("Invalid nkey")]
    TokenNotFound,

    #[error("Expired nkey")]
    TokenExpired,

    #[error("NKey is not valid for this app")]
    ScopeDenied,

    #[error("Failed to generate secure random value")]
    RandomGenerationFailed,

    #[error("Generated nkey collided with an existing one")]
    TokenCollision,

    #[error("Storage unavailable")]
    StorageUnavailable,

    #[error("User not found")]
    UserNotFound,

    #[error("App not found")]
    AppNotFound,

    #[error("App already exists")]
    AppAlreadyExists,

    #[error("Invite code not found")]
    InviteNotFound,

    #[error("Invite code has already been used")]
    InviteAlreadyUsed,

    #[error("{0}")]
    SelfModification(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(e) => {
                tracing::error!(error = %e, "Credential store unavailable");
                ServiceError::StorageUnavailable
            }
            StoreError::Duplicate(UniqueField::Username) => ServiceError::UsernameTaken,
            StoreError::Duplicate(UniqueField::KeyValue) => ServiceError::TokenCollision,
            StoreError::Duplicate(UniqueField::AppId) => ServiceError::AppAlreadyExists,
            StoreError::Duplicate(UniqueField::InviteCode) => {
                ServiceError::Internal(anyhow::anyhow!("generated invite code already exists"))
            }
            StoreError::InviteUnavailable => ServiceError::InvalidInvite,
        }
    }
}

impl From<RandomError> for ServiceError {
    fn from(err: RandomError) -> Self {
        tracing::error!(error = %err, "Random source failed");
        ServiceError::RandomGenerationFailed
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = anyhow::anyhow!(err.to_string());
        match err {
            ServiceError::InvalidInvite => AppError::BadRequest(message),
            ServiceError::UsernameTaken => AppError::Conflict(message),
            ServiceError::InvalidCredentials => AppError::AuthError(message),
            ServiceError::InvalidSession => AppError::Unauthorized(message),
            ServiceError::UnknownOrInactiveApp(_) => AppError::BadRequest(message),
            ServiceError::ScopeForbidden(_) => AppError::Forbidden(message),
            ServiceError::TokenNotFound => AppError::Unauthorized(message),
            ServiceError::TokenExpired => AppError::Unauthorized(message),
            ServiceError::ScopeDenied => AppError::Forbidden(message),
            ServiceError::RandomGenerationFailed | ServiceError::TokenCollision => {
                AppError::InternalError(message)
            }
            ServiceError::StorageUnavailable => AppError::ServiceUnavailable,
            ServiceError::UserNotFound
            | ServiceError::AppNotFound
            | ServiceError::InviteNotFound => AppError::NotFound(message),
            ServiceError::AppAlreadyExists => AppError::Conflict(message),
            ServiceError::InviteAlreadyUsed
            | ServiceError::SelfModification(_)
            | ServiceError::ValidationError(_) => AppError::BadRequest(message),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_domain_errors() {
        assert!(matches!(
            ServiceError::from(StoreError::Duplicate(UniqueField::Username)),
            ServiceError::UsernameTaken
        ));
        assert!(matches!(
            ServiceError::from(StoreError::Duplicate(UniqueField::KeyValue)),
            ServiceError::TokenCollision
        ));
        assert!(matches!(
            ServiceError::from(StoreError::InviteUnavailable),
            ServiceError::InvalidInvite
        ));
        assert!(matches!(
            ServiceError::from(StoreError::unavailable(anyhow::anyhow!("down"))),
            ServiceError::StorageUnavailable
        ));
    }

    #[test]
    fn transport_mapping_keeps_client_errors_distinct() {
        use service_core::axum::{http::StatusCode, response::IntoResponse};

        let status = |e: ServiceError| AppError::from(e).into_response().status();
        assert_eq!(status(ServiceError::TokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ServiceError::ScopeDenied), StatusCode::FORBIDDEN);
        assert_eq!(
            status(ServiceError::ScopeForbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status(ServiceError::UsernameTaken), StatusCode::CONFLICT);
        assert_eq!(
            status(ServiceError::StorageUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(ServiceError::RandomGenerationFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
