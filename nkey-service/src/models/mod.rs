pub mod access_override;
pub mod app;
pub mod audit;
pub mod invite;
pub mod nkey;
pub mod role;
pub mod user;

pub use access_override::AccessOverride;
pub use app::{App, AppResponse};
pub use audit::{AuditAction, AuditRecord, ClientMeta};
pub use invite::InviteCode;
pub use nkey::{AppIdSet, NKey};
pub use role::Role;
pub use user::{User, UserResponse};
