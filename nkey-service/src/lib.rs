pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::ServiceConfig;
use crate::services::{
    AdminService, CredentialStore, IdentityService, JwtService, NKeyService, Notifier,
    RandomSource,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::user::get_me,
        handlers::user::update_me,
        handlers::user::my_apps,
        handlers::nkey::generate,
        handlers::nkey::validate,
        handlers::admin::create_user,
        handlers::admin::list_users,
        handlers::admin::get_user,
        handlers::admin::update_user,
        handlers::admin::remove_user,
        handlers::admin::list_user_overrides,
        handlers::admin::generate_invite_code,
        handlers::admin::list_invite_codes,
        handlers::admin::delete_invite_code,
        handlers::admin::list_apps,
        handlers::admin::create_app,
        handlers::admin::update_app,
        handlers::admin::toggle_app,
        handlers::admin::set_access_override,
        handlers::admin::list_audit_logs,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::UserPage,
            dtos::InvitePage,
            dtos::AuditPage,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::AuthResponse,
            dtos::auth::UpdateProfileRequest,
            dtos::auth::AllowedAppResponse,
            dtos::nkey::GenerateNKeyRequest,
            dtos::nkey::GenerateNKeyResponse,
            dtos::nkey::ValidateNKeyRequest,
            dtos::nkey::ValidateNKeyResponse,
            dtos::admin::CreateUserRequest,
            dtos::admin::UpdateUserRequest,
            dtos::admin::CreateAppRequest,
            dtos::admin::CreateAppResponse,
            dtos::admin::UpdateAppRequest,
            dtos::admin::UpdateAppResponse,
            dtos::admin::SetAccessOverrideRequest,
            services::Session,
            models::Role,
            models::UserResponse,
            models::AppResponse,
            models::InviteCode,
            models::AccessOverride,
            models::AuditAction,
            models::AuditRecord,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Invite-gated registration and login"),
        (name = "User", description = "Self-service profile"),
        (name = "NKey", description = "Capability token issuance and validation"),
        (name = "Admin", description = "Administrative operations"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub store: Arc<dyn CredentialStore>,
    pub identity: IdentityService,
    pub nkeys: NKeyService,
    pub admin: AdminService,
    pub login_rate_limiter: IpRateLimit,
    pub register_rate_limiter: IpRateLimit,
    pub validate_rate_limiter: IpRateLimit,
}

impl AppState {
    /// Wires every service over the given collaborators.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt)?;
        let identity = IdentityService::new(store.clone(), jwt);
        let nkeys = NKeyService::new(
            store.clone(),
            random.clone(),
            notifier,
            config.nkey.expiration_seconds,
        );
        let admin = AdminService::new(store.clone(), random);

        let limits = &config.rate_limit;
        let trust = limits.trust_forwarded_for;
        let login_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds),
            trust,
        );
        let register_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(limits.register_attempts, limits.register_window_seconds),
            trust,
        );
        let validate_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(limits.validate_limit, limits.validate_window_seconds),
            trust,
        );

        Ok(Self {
            config,
            store,
            identity,
            nkeys,
            admin,
            login_rate_limiter,
            register_rate_limiter,
            validate_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/users",
            post(handlers::admin::create_user).get(handlers::admin::list_users),
        )
        .route("/users/:user_id", get(handlers::admin::get_user))
        .route("/users/:user_id/update", post(handlers::admin::update_user))
        .route("/users/:user_id/delete", post(handlers::admin::remove_user))
        .route(
            "/users/:user_id/overrides",
            get(handlers::admin::list_user_overrides),
        )
        .route(
            "/invite-codes",
            post(handlers::admin::generate_invite_code).get(handlers::admin::list_invite_codes),
        )
        .route(
            "/invite-codes/:code/delete",
            post(handlers::admin::delete_invite_code),
        )
        .route(
            "/apps",
            get(handlers::admin::list_apps).post(handlers::admin::create_app),
        )
        .route("/apps/:app_id/update", post(handlers::admin::update_app))
        .route("/apps/:app_id/toggle", post(handlers::admin::toggle_app))
        .route("/overrides", post(handlers::admin::set_access_override))
        .route("/logs", get(handlers::admin::list_audit_logs))
        .layer(from_fn(middleware::admin_middleware));

    // Session-protected routes; admin routes additionally require the Admin role.
    let protected_routes = Router::new()
        .route(
            "/user/me",
            get(handlers::user::get_me).put(handlers::user::update_me),
        )
        .route("/user/apps", get(handlers::user::my_apps))
        .route("/nkey/generate", post(handlers::nkey::generate))
        .nest("/admin", admin_routes)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let validate_route = Router::new()
        .route("/nkey/validate", post(handlers::nkey::validate))
        .layer(from_fn_with_state(
            state.validate_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let api_v1 = Router::new()
        .merge(login_route)
        .merge(register_route)
        .merge(validate_route)
        .merge(protected_routes);

    let cors = build_cors(&state.config.security.allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .nest("/api/v1", api_v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Credential store is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Credential store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
