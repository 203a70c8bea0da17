//! Caller identity from headers set by the upstream authenticator.
//!
//! These headers are trusted as sent. The authenticator in front of the service must strip or
//! overwrite them on every inbound request; otherwise any client can claim `X-User-Roles: Admin`.
//! Deployments that grant only through the grants file turn role headers off with
//! `DBREST_TRUST_ROLE_HEADERS=false`.

use crate::permission::Principal;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const USER_ID_HEADER: &str = "X-User-Id";
/// Comma-separated role names.
pub const USER_ROLES_HEADER: &str = "X-User-Roles";

#[derive(Clone, Debug, Default)]
pub struct PrincipalHeaders(pub Principal);

impl PrincipalHeaders {
    /// The caller as the gate should see it; header roles are dropped unless trusted.
    pub fn principal(&self, trust_roles: bool) -> Principal {
        Principal {
            user_id: self.0.user_id.clone(),
            roles: if trust_roles { self.0.roles.clone() } else { Vec::new() },
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PrincipalHeaders
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let user_id = header(USER_ID_HEADER);
        let roles = header(USER_ROLES_HEADER)
            .map(|r| {
                r.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(PrincipalHeaders(Principal { user_id, roles }))
    }
}
