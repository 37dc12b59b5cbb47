pub mod admin;
pub mod auth;
pub mod nkey;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{AuditRecord, InviteCode, UserResponse};
use crate::services::Page;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Invalid username or password")]
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "User removed")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `?page=&size=` query for admin listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number.
    #[param(example = 1)]
    pub page: Option<i64>,
    /// Items per page, 1 to 100.
    #[param(example = 20)]
    pub size: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    UserPage = Paginated<UserResponse>,
    InvitePage = Paginated<InviteCode>,
    AuditPage = Paginated<AuditRecord>
)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[schema(example = 42)]
    pub total: i64,
    #[schema(example = 1)]
    pub page: i64,
    #[schema(example = 20)]
    pub size: i64,
}

impl<T> Paginated<T> {
    pub fn from_page<U>(page: Page<U>, map: impl Fn(U) -> T) -> Self {
        Self {
            items: page.items.into_iter().map(map).collect(),
            total: page.total,
            page: page.page,
            size: page.size,
        }
    }
}
