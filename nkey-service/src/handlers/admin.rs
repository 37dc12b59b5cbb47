//! Administrative endpoints. Every route here sits behind the session and
//! admin-role middleware.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::admin::{
    CreateAppRequest, CreateAppResponse, CreateUserRequest, SetAccessOverrideRequest,
    UpdateAppRequest, UpdateAppResponse, UpdateUserRequest,
};
use crate::dtos::{AuditPage, ErrorResponse, InvitePage, MessageResponse, PageQuery, Paginated, UserPage};
use crate::middleware::{AuthUser, ClientInfo};
use crate::models::{AccessOverride, AppResponse, InviteCode, UserResponse};
use crate::services::Pagination;
use crate::utils::ValidatedJson;
use crate::AppState;

const USER_PAGE_SIZE: i64 = 10;
const INVITE_PAGE_SIZE: i64 = 20;
const AUDIT_PAGE_SIZE: i64 = 20;

// ==================== Users ====================

/// Create a user without an invite code (role is always `user`)
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state
        .admin
        .create_user(auth.user_id, req.into(), &client)
        .await?;
    Ok((StatusCode::CREATED, Json(user.sanitized())))
}

/// List users, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 403, description = "Admin privileges required", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<UserResponse>>, AppError> {
    let page = state
        .admin
        .list_users(Pagination::new(query.page, query.size, USER_PAGE_SIZE))
        .await?;
    Ok(Json(Paginated::from_page(page, |user| user.sanitized())))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.admin.get_user(user_id).await?;
    Ok(Json(user.sanitized()))
}

/// Update username, password, role or contact fields
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{user_id}/update",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Admins cannot demote themselves", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .admin
        .update_user(auth.user_id, user_id, req.into(), &client)
        .await?;
    Ok(Json(user.sanitized()))
}

/// Soft-remove a user
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{user_id}/delete",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User removed", body = MessageResponse),
        (status = 400, description = "Admins cannot remove themselves", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn remove_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.admin.remove_user(auth.user_id, user_id, &client).await?;
    Ok(Json(MessageResponse::new("User removed")))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{user_id}/overrides",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Access overrides for the user", body = [AccessOverride]),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_user_overrides(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<AccessOverride>>, AppError> {
    Ok(Json(state.admin.list_user_overrides(user_id).await?))
}

// ==================== Invite codes ====================

#[utoipa::path(
    post,
    path = "/api/v1/admin/invite-codes",
    responses(
        (status = 201, description = "Invite code generated", body = InviteCode),
        (status = 403, description = "Admin privileges required", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn generate_invite_code(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<InviteCode>), AppError> {
    let invite = state.admin.generate_invite_code().await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/invite-codes",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of invite codes", body = InvitePage)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_invite_codes(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<InviteCode>>, AppError> {
    let page = state
        .admin
        .list_invite_codes(Pagination::new(query.page, query.size, INVITE_PAGE_SIZE))
        .await?;
    Ok(Json(Paginated::from_page(page, |invite| invite)))
}

/// Delete an unredeemed invite code
#[utoipa::path(
    post,
    path = "/api/v1/admin/invite-codes/{code}/delete",
    params(("code" = String, Path, description = "Invite code")),
    responses(
        (status = 200, description = "Invite code deleted", body = MessageResponse),
        (status = 400, description = "Invite code has already been used", body = ErrorResponse),
        (status = 404, description = "Invite code not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_invite_code(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    Path(code): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .admin
        .delete_invite_code(auth.user_id, &code, &client)
        .await?;
    Ok(Json(MessageResponse::new("Invite code deleted")))
}

// ==================== Apps ====================

#[utoipa::path(
    get,
    path = "/api/v1/admin/apps",
    responses(
        (status = 200, description = "All registered apps", body = [AppResponse])
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_apps(State(state): State<AppState>) -> Result<Json<Vec<AppResponse>>, AppError> {
    let apps = state.admin.list_apps().await?;
    Ok(Json(apps.iter().map(AppResponse::from).collect()))
}

/// Register a downstream app. The secret is only returned here.
#[utoipa::path(
    post,
    path = "/api/v1/admin/apps",
    request_body = CreateAppRequest,
    responses(
        (status = 201, description = "App created", body = CreateAppResponse),
        (status = 409, description = "App already exists", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn create_app(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    ValidatedJson(req): ValidatedJson<CreateAppRequest>,
) -> Result<(StatusCode, Json<CreateAppResponse>), AppError> {
    let app = state
        .admin
        .create_app(auth.user_id, req.into(), &client)
        .await?;
    Ok((StatusCode::CREATED, Json(app.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/apps/{app_id}/update",
    params(("app_id" = String, Path, description = "App id")),
    request_body = UpdateAppRequest,
    responses(
        (status = 200, description = "App updated", body = UpdateAppResponse),
        (status = 404, description = "App not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_app(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    Path(app_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateAppRequest>,
) -> Result<Json<UpdateAppResponse>, AppError> {
    let rotated = req.rotate_secret;
    let app = state
        .admin
        .update_app(auth.user_id, &app_id, req.into(), &client)
        .await?;

    Ok(Json(UpdateAppResponse {
        app: AppResponse::from(&app),
        secret_key: rotated.then_some(app.secret_key),
    }))
}

/// Activate or deactivate an app
#[utoipa::path(
    post,
    path = "/api/v1/admin/apps/{app_id}/toggle",
    params(("app_id" = String, Path, description = "App id")),
    responses(
        (status = 200, description = "App status toggled", body = AppResponse),
        (status = 404, description = "App not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn toggle_app(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    Path(app_id): Path<String>,
) -> Result<Json<AppResponse>, AppError> {
    let app = state.admin.toggle_app(auth.user_id, &app_id, &client).await?;
    Ok(Json(AppResponse::from(&app)))
}

// ==================== Overrides & audit ====================

/// Create or replace a per-user, per-app access override
#[utoipa::path(
    post,
    path = "/api/v1/admin/overrides",
    request_body = SetAccessOverrideRequest,
    responses(
        (status = 200, description = "Override stored", body = AccessOverride),
        (status = 404, description = "User or app not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn set_access_override(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientInfo(client): ClientInfo,
    ValidatedJson(req): ValidatedJson<SetAccessOverrideRequest>,
) -> Result<Json<AccessOverride>, AppError> {
    let entry = state
        .admin
        .set_access_override(auth.user_id, req.into(), &client)
        .await?;
    Ok(Json(entry))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/logs",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of audit records, newest first", body = AuditPage)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<crate::models::AuditRecord>>, AppError> {
    let page = state
        .admin
        .list_audit(Pagination::new(query.page, query.size, AUDIT_PAGE_SIZE))
        .await?;
    Ok(Json(Paginated::from_page(page, |record| record)))
}
