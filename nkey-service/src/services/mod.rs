//! Services layer for nkey-service.
//!
//! Business logic for identities, NKeys, access policy and administration,
//! written against the `CredentialStore`, `RandomSource` and `Notifier`
//! collaborators.

pub mod admin;
mod audit;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod nkey;
pub mod notifier;
pub mod policy;
pub mod random;
pub mod store;

pub use admin::{AdminService, Page, Pagination};
pub use error::ServiceError;
pub use identity::{IdentityService, RegisterInput, Registration, Session};
pub use jwt::{JwtService, SessionClaims};
pub use nkey::{IssuedNKey, NKeyService, NKeyValidation};
pub use notifier::{MockNotifier, Notifier, PushDeerNotifier};
pub use policy::AccessPolicy;
pub use random::{OsRandomSource, RandomSource};
pub use store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore, StoreError};
