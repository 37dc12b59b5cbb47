pub mod admin;
pub mod auth;
pub mod client;

pub use admin::admin_middleware;
pub use auth::{session_middleware, AuthUser};
pub use client::ClientInfo;
