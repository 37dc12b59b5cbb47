use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use service_core::middleware::rate_limit::resolve_client_ip;
use std::convert::Infallible;

use crate::models::ClientMeta;
use crate::AppState;

/// Caller address and user agent for audit records. Never rejects.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo(pub ClientMeta);

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ip_address = resolve_client_ip(
            &parts.headers,
            &parts.extensions,
            state.config.rate_limit.trust_forwarded_for,
        )
        .map(|ip| ip.to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(256).collect());

        Ok(ClientInfo(ClientMeta {
            ip_address,
            user_agent,
        }))
    }
}
