//! Access policy: may a user with a given role be granted an app?
//!
//! Two steps. The role gate is decided by exactly one [`RoleGate`] rule.
//! Only if it passes is the user's override for the app consulted, and an
//! override can only take access away.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::store::CredentialStore;
use super::ServiceError;
use crate::models::{AccessOverride, App, Role};

/// The rule that decides the role gate for a (required, held) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    /// Admin-gated apps admit only Admin; Trusted does not qualify.
    AdminExact,
    /// Apps gated at the floor tier admit every role.
    FloorOpen,
    /// A DisabledUser fails every gate above the floor.
    DisabledExcluded,
    /// Everything else follows the role order.
    Hierarchy,
}

impl RoleGate {
    pub fn governing(required: Role, held: Role) -> Self {
        match (required, held) {
            (Role::Admin, _) => RoleGate::AdminExact,
            (Role::DisabledUser, _) => RoleGate::FloorOpen,
            (_, Role::DisabledUser) => RoleGate::DisabledExcluded,
            _ => RoleGate::Hierarchy,
        }
    }

    pub fn permits(self, required: Role, held: Role) -> bool {
        match self {
            RoleGate::AdminExact => held == Role::Admin,
            RoleGate::FloorOpen => true,
            RoleGate::DisabledExcluded => false,
            RoleGate::Hierarchy => held.at_least(required),
        }
    }
}

pub fn role_gate_permits(required: Role, held: Role) -> bool {
    RoleGate::governing(required, held).permits(required, held)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    RoleDenied(RoleGate),
    OverrideDisabled,
    OverrideLapsed,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Pure form of the decision, for callers that already hold the override.
pub fn decide(
    held: Role,
    app: &App,
    entry: Option<&AccessOverride>,
    now: DateTime<Utc>,
) -> AccessDecision {
    let gate = RoleGate::governing(app.required_role, held);
    if !gate.permits(app.required_role, held) {
        return AccessDecision::RoleDenied(gate);
    }

    match entry {
        Some(o) if !o.enabled => AccessDecision::OverrideDisabled,
        Some(o) if o.is_lapsed(now) => AccessDecision::OverrideLapsed,
        _ => AccessDecision::Granted,
    }
}

#[derive(Clone)]
pub struct AccessPolicy {
    store: Arc<dyn CredentialStore>,
}

impl AccessPolicy {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn evaluate(
        &self,
        user_id: Uuid,
        held: Role,
        app: &App,
        now: DateTime<Utc>,
    ) -> Result<AccessDecision, ServiceError> {
        let gate = RoleGate::governing(app.required_role, held);
        if !gate.permits(app.required_role, held) {
            return Ok(AccessDecision::RoleDenied(gate));
        }

        let entry = self.store.find_access_override(user_id, &app.app_id).await?;
        Ok(decide(held, app, entry.as_ref(), now))
    }

    pub async fn may_grant(
        &self,
        user_id: Uuid,
        held: Role,
        app: &App,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let decision = self.evaluate(user_id, held, app, now).await?;
        if !decision.is_granted() {
            tracing::debug!(%user_id, app_id = %app.app_id, ?decision, "Access denied");
        }
        Ok(decision.is_granted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn app(required: Role) -> App {
        App::new("a".into(), "A".into(), "secret".into(), required)
    }

    #[test]
    fn admin_gate_requires_exact_admin() {
        assert!(role_gate_permits(Role::Admin, Role::Admin));
        assert!(!role_gate_permits(Role::Admin, Role::Trusted));
        assert!(!role_gate_permits(Role::Admin, Role::User));
        assert_eq!(RoleGate::governing(Role::Admin, Role::Trusted), RoleGate::AdminExact);
    }

    #[test]
    fn floor_gate_admits_everyone() {
        for held in Role::ALL {
            assert!(role_gate_permits(Role::DisabledUser, held));
        }
    }

    #[test]
    fn disabled_users_fail_every_gate_above_the_floor() {
        for required in [Role::User, Role::Trusted] {
            assert_eq!(
                RoleGate::governing(required, Role::DisabledUser),
                RoleGate::DisabledExcluded
            );
            assert!(!role_gate_permits(required, Role::DisabledUser));
        }
    }

    #[test]
    fn trusted_gate_follows_the_hierarchy() {
        assert!(role_gate_permits(Role::Trusted, Role::Admin));
        assert!(role_gate_permits(Role::Trusted, Role::Trusted));
        assert!(!role_gate_permits(Role::Trusted, Role::User));
        assert!(role_gate_permits(Role::User, Role::Trusted));
    }

    #[test]
    fn disabled_override_denies_a_qualifying_role() {
        let now = Utc::now();
        let entry = AccessOverride::new(Uuid::new_v4(), "a".into(), false);
        assert_eq!(
            decide(Role::Admin, &app(Role::User), Some(&entry), now),
            AccessDecision::OverrideDisabled
        );
    }

    #[test]
    fn lapsed_override_denies_and_live_one_passes() {
        let now = Utc::now();
        let mut entry = AccessOverride::new(Uuid::new_v4(), "a".into(), true);

        entry.valid_until = Some(now - Duration::seconds(1));
        assert_eq!(
            decide(Role::User, &app(Role::User), Some(&entry), now),
            AccessDecision::OverrideLapsed
        );

        entry.valid_until = Some(now + Duration::hours(1));
        assert!(decide(Role::User, &app(Role::User), Some(&entry), now).is_granted());
    }

    #[test]
    fn enabled_override_never_widens_access() {
        let entry = AccessOverride::new(Uuid::new_v4(), "a".into(), true);
        let decision = decide(Role::User, &app(Role::Admin), Some(&entry), Utc::now());
        assert_eq!(decision, AccessDecision::RoleDenied(RoleGate::AdminExact));
    }
}
