//! HTTP handlers for nkey-service.

pub mod admin;
pub mod auth;
pub mod nkey;
pub mod user;

pub use auth::*;
pub use nkey::*;
pub use user::*;
