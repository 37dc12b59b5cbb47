//! Shared setup for nkey-service integration tests.
//!
//! Everything runs against the in-memory store with a recording notifier,
//! so no external services are needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use nkey_service::{
    build_router,
    config::ServiceConfig,
    models::{App, ClientMeta, InviteCode, Role, User},
    services::{
        random::SequenceRandomSource, CredentialStore, InMemoryCredentialStore, MockNotifier,
        RandomSource,
    },
    utils::{hash_password, Password},
    AppState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub store: Arc<InMemoryCredentialStore>,
    pub notifier: Arc<MockNotifier>,
    pub state: AppState,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(ServiceConfig::for_tests())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        Self::build(config, Arc::new(SequenceRandomSource::default()))
    }

    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        Self::build(ServiceConfig::for_tests(), random)
    }

    fn build(config: ServiceConfig, random: Arc<dyn RandomSource>) -> Self {
        let store = Arc::new(InMemoryCredentialStore::new());
        let notifier = Arc::new(MockNotifier::new());
        let state = AppState::new(config, store.clone(), notifier.clone(), random)
            .expect("Failed to build app state");

        Self {
            store,
            notifier,
            state,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Inserts an active app gated at `required_role`.
    pub async fn add_app(&self, app_id: &str, required_role: Role) -> App {
        let app = App::new(
            app_id.to_string(),
            format!("{} app", app_id),
            format!("{}-secret", app_id),
            required_role,
        );
        self.state
            .store
            .insert_app(&app)
            .await
            .expect("Failed to insert app");
        app
    }

    pub async fn deactivate_app(&self, app_id: &str) {
        let mut app = self
            .state
            .store
            .find_app(app_id)
            .await
            .unwrap()
            .expect("app exists");
        app.is_active = false;
        self.state.store.save_app(&app).await.unwrap();
    }

    /// Inserts an identity directly, bypassing the invite flow.
    pub async fn add_user(&self, username: &str, role: Role) -> User {
        self.add_user_with_token(username, role, None).await
    }

    pub async fn add_user_with_token(
        &self,
        username: &str,
        role: Role,
        pushdeer_token: Option<&str>,
    ) -> User {
        let hash = hash_password(&Password::new(TEST_PASSWORD)).expect("hash");
        let user = User::new(username.to_string(), hash.into_string(), role)
            .with_contact(None, pushdeer_token.map(str::to_string));
        self.state
            .store
            .insert_user(&user)
            .await
            .expect("Failed to insert user");
        user
    }

    pub async fn add_invite(&self, code: &str) -> InviteCode {
        let invite = InviteCode::new(code.to_string());
        self.state
            .store
            .insert_invite_code(&invite)
            .await
            .expect("Failed to insert invite");
        invite
    }

    pub fn session_for(&self, user: &User) -> String {
        self.state
            .identity
            .issue_session(user)
            .expect("Failed to issue session")
            .token
    }

    /// Sends a JSON request through the router and returns status and body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn client() -> ClientMeta {
    ClientMeta {
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("nkey-tests".to_string()),
    }
}
