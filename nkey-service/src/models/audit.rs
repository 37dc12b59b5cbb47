//! Audit model - append-only record of administrative and token events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateUser,
    UpdateUser,
    DeleteUser,
    DeleteInviteCode,
    CreateApp,
    UpdateApp,
    ToggleAppStatus,
    SetAccessOverride,
    NkeyIssued,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateUser => "CREATE_USER",
            AuditAction::UpdateUser => "UPDATE_USER",
            AuditAction::DeleteUser => "DELETE_USER",
            AuditAction::DeleteInviteCode => "DELETE_INVITE_CODE",
            AuditAction::CreateApp => "CREATE_APP",
            AuditAction::UpdateApp => "UPDATE_APP",
            AuditAction::ToggleAppStatus => "TOGGLE_APP_STATUS",
            AuditAction::SetAccessOverride => "SET_ACCESS_OVERRIDE",
            AuditAction::NkeyIssued => "NKEY_ISSUED",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE_USER" => Ok(AuditAction::CreateUser),
            "UPDATE_USER" => Ok(AuditAction::UpdateUser),
            "DELETE_USER" => Ok(AuditAction::DeleteUser),
            "DELETE_INVITE_CODE" => Ok(AuditAction::DeleteInviteCode),
            "CREATE_APP" => Ok(AuditAction::CreateApp),
            "UPDATE_APP" => Ok(AuditAction::UpdateApp),
            "TOGGLE_APP_STATUS" => Ok(AuditAction::ToggleAppStatus),
            "SET_ACCESS_OVERRIDE" => Ok(AuditAction::SetAccessOverride),
            "NKEY_ISSUED" => Ok(AuditAction::NkeyIssued),
            _ => Err(format!("Invalid audit action: {}", s)),
        }
    }
}

/// Where a request came from, as far as the transport can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub action: AuditAction,
    pub target_type: String,
    pub target_id: String,
    pub operator_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: String,
    pub created_utc: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, target_type: &str, target_id: impl Into<String>) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            action,
            target_type: target_type.to_string(),
            target_id: target_id.into(),
            operator_id: None,
            ip_address: None,
            user_agent: None,
            details: String::new(),
            created_utc: Utc::now(),
        }
    }

    pub fn operator(mut self, operator_id: Uuid) -> Self {
        self.operator_id = Some(operator_id);
        self
    }

    pub fn client(mut self, client: &ClientMeta) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}
