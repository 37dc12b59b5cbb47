//! Invite code model - single-use registration gates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InviteCode {
    #[schema(example = "q3V0xT1cS7m2y9LhZ0aB4w")]
    pub code: String,
    pub created_utc: DateTime<Utc>,
    pub redeemed_by: Option<Uuid>,
    pub redeemed_utc: Option<DateTime<Utc>>,
}

impl InviteCode {
    pub fn new(code: String) -> Self {
        Self {
            code,
            created_utc: Utc::now(),
            redeemed_by: None,
            redeemed_utc: None,
        }
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed_by.is_some()
    }
}
