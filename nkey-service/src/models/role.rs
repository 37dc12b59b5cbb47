//! Role model - the four permission tiers and their total order.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Permission tier attached to every identity.
///
/// Tiers are totally ordered by [`Role::level`]; policy carve-outs on top of
/// that order live in `services::policy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Trusted,
    #[default]
    User,
    DisabledUser,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Trusted, Role::User, Role::DisabledUser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Trusted => "trusted",
            Role::User => "user",
            Role::DisabledUser => "disableduser",
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Role::Admin => 4,
            Role::Trusted => 3,
            Role::User => 2,
            Role::DisabledUser => 1,
        }
    }

    /// Level of a raw role string; anything unrecognised sits at 0.
    pub fn level_of(raw: &str) -> u8 {
        raw.parse::<Role>().map(|r| r.level()).unwrap_or(0)
    }

    pub fn at_least(&self, required: Role) -> bool {
        self.level() >= required.level()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "trusted" => Ok(Role::Trusted),
            "user" => Ok(Role::User),
            "disableduser" => Ok(Role::DisabledUser),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_roles_dominate_lower_ones() {
        for have in Role::ALL {
            for need in Role::ALL {
                let expected = have.level() >= need.level();
                assert_eq!(have.at_least(need), expected, "{have} vs {need}");
                if have.level() > need.level() {
                    assert!(!need.at_least(have), "{need} must not reach {have}");
                }
            }
        }
    }

    #[test]
    fn every_role_reaches_itself() {
        for role in Role::ALL {
            assert!(role.at_least(role));
        }
    }

    #[test]
    fn unknown_role_strings_have_level_zero() {
        assert_eq!(Role::level_of("superuser"), 0);
        assert_eq!(Role::level_of(""), 0);
        assert_eq!(Role::level_of("Admin"), 4);
        assert_eq!(Role::level_of("disableduser"), 1);
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Role::DisabledUser).unwrap();
        assert_eq!(json, "\"disableduser\"");
        let back: Role = serde_json::from_str("\"trusted\"").unwrap();
        assert_eq!(back, Role::Trusted);
    }
}
