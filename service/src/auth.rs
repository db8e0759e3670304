//! Principal resolution.
//!
//! Authentication happens before requests reach this service. This module
//! only turns what the authenticator left on the request into a [`Principal`].
use crate::config::Config;
use events::{Principal, Role};
use http::header::{HeaderMap, HeaderName, InvalidHeaderName};
use log::*;

/// Resolves the authenticated principal for an incoming request, if any.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Trusts identity headers set by the authenticating reverse proxy.
///
/// The proxy must strip these headers from client requests; this resolver
/// does no verification of its own.
#[derive(Debug, Clone)]
pub struct TrustedHeaderResolver {
    user_header: HeaderName,
    role_header: HeaderName,
}

impl TrustedHeaderResolver {
    pub fn new(user_header: &str, role_header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            user_header: HeaderName::try_from(user_header)?,
            role_header: HeaderName::try_from(role_header)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, InvalidHeaderName> {
        Self::new(config.auth_user_header(), config.auth_role_header())
    }
}

impl PrincipalResolver for TrustedHeaderResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let user_id = headers
            .get(&self.user_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())?;

        let role = headers
            .get(&self.role_header)
            .and_then(|value| value.to_str().ok())
            .and_then(|role| match role.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    debug!("Ignoring unknown role `{role}` for user {user_id}");
                    None
                }
            });

        Some(Principal::new(user_id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn resolver() -> TrustedHeaderResolver {
        TrustedHeaderResolver::new("x-user-id", "x-user-role").unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn resolves_user_and_role() {
        let principal = resolver()
            .resolve(&headers(&[("x-user-id", "u9"), ("x-user-role", "ADMIN")]))
            .unwrap();

        assert_eq!(principal, Principal::new("u9", Some(Role::Admin)));
    }

    #[test]
    fn missing_or_blank_user_is_unauthenticated() {
        assert!(resolver().resolve(&headers(&[])).is_none());
        assert!(resolver()
            .resolve(&headers(&[("x-user-id", "  "), ("x-user-role", "ADMIN")]))
            .is_none());
    }

    #[test]
    fn unknown_role_resolves_without_role() {
        let principal = resolver()
            .resolve(&headers(&[("x-user-id", "u1"), ("x-user-role", "owner")]))
            .unwrap();

        assert_eq!(principal.role, None);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        assert!(TrustedHeaderResolver::new("x user", "x-user-role").is_err());
    }
}
