use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::event::Event;

/// Identifier of an application user as known to the authentication layer.
pub type UserId = String;

/// Application roles an event can be targeted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Barber,
    Client,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RoleParseError;

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("expected one of ADMIN, BARBER, CLIENT")
    }
}

impl std::error::Error for RoleParseError {}

impl FromStr for Role {
    type Err = RoleParseError;
    fn from_str(role: &str) -> Result<Role, Self::Err> {
        match role.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "BARBER" => Ok(Role::Barber),
            "CLIENT" => Ok(Role::Client),
            _ => Err(RoleParseError),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Barber => write!(f, "BARBER"),
            Role::Client => write!(f, "CLIENT"),
        }
    }
}

/// The authenticated identity a connection acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(user_id: impl Into<UserId>, role: Option<Role>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Describes who an event is intended for.
///
/// `broadcast` overrides everything else. Otherwise a principal is a
/// recipient when its user id is listed in `users` or its role is listed in
/// `roles`. A target with nothing set reaches nobody, which is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub users: Vec<UserId>,
    pub roles: Vec<Role>,
    pub broadcast: bool,
}

impl Target {
    pub fn broadcast() -> Self {
        Self {
            broadcast: true,
            ..Self::default()
        }
    }

    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            users: vec![user_id.into()],
            ..Self::default()
        }
    }

    pub fn users<I, U>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        Self {
            users: user_ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds roles to an existing target, keeping its users.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    /// True when this target can never match any principal.
    pub fn is_dead(&self) -> bool {
        !self.broadcast && self.users.is_empty() && self.roles.is_empty()
    }

    /// Decides whether `principal` is one of the intended recipients.
    pub fn admits(&self, principal: &Principal) -> bool {
        if self.broadcast {
            return true;
        }

        if self.users.iter().any(|user_id| *user_id == principal.user_id) {
            return true;
        }

        match principal.role {
            Some(role) => self.roles.contains(&role),
            None => false,
        }
    }
}

/// Returns whether `event` is visible to `principal`.
pub fn matches(event: &Event, principal: &Principal) -> bool {
    event.target().admits(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principals() -> Vec<Principal> {
        vec![
            Principal::new("u1", None),
            Principal::new("u2", Some(Role::Client)),
            Principal::new("u9", Some(Role::Admin)),
            Principal::new("", Some(Role::Barber)),
        ]
    }

    #[test]
    fn broadcast_admits_every_principal_regardless_of_lists() {
        let targets = [
            Target::broadcast(),
            Target {
                users: vec!["someone-else".to_string()],
                roles: vec![Role::Barber],
                broadcast: true,
            },
        ];

        for target in &targets {
            for principal in principals() {
                assert!(target.admits(&principal), "{principal:?} should match");
            }
        }
    }

    #[test]
    fn user_targeting_admits_only_listed_users() {
        let target = Target::users(["u1", "u3"]);

        assert!(target.admits(&Principal::new("u1", None)));
        assert!(target.admits(&Principal::new("u3", Some(Role::Client))));
        assert!(!target.admits(&Principal::new("u2", None)));
        assert!(!target.admits(&Principal::new("u2", Some(Role::Admin))));
    }

    #[test]
    fn role_targeting_admits_only_listed_roles() {
        let target = Target::roles([Role::Admin]);

        assert!(target.admits(&Principal::new("u9", Some(Role::Admin))));
        assert!(!target.admits(&Principal::new("u9", Some(Role::Client))));
        assert!(!target.admits(&Principal::new("u9", None)));
    }

    #[test]
    fn users_or_roles_is_enough() {
        let target = Target::user("u1").with_roles([Role::Barber]);

        assert!(target.admits(&Principal::new("u1", Some(Role::Client))));
        assert!(target.admits(&Principal::new("u7", Some(Role::Barber))));
        assert!(!target.admits(&Principal::new("u7", Some(Role::Client))));
    }

    #[test]
    fn dead_target_admits_nobody() {
        let target = Target::default();

        assert!(target.is_dead());
        for principal in principals() {
            assert!(!target.admits(&principal));
        }
    }

    #[test]
    fn target_fields_default_when_absent() {
        let target: Target = serde_json::from_str(r#"{"roles":["ADMIN"]}"#).unwrap();

        assert_eq!(target, Target::roles([Role::Admin]));
        assert!(!target.broadcast);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" Barber ".parse::<Role>(), Ok(Role::Barber));
        assert_eq!("owner".parse::<Role>(), Err(RoleParseError));
    }
}
