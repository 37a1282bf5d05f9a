//! services/api/src/web/auth.rs
//!
//! Claims handling for requests arriving through the upstream gateway
//! authorizer. The gateway verifies the JWT and forwards its claims object
//! in the `x-jwt-claims` header; this module parses that into a typed
//! `Claims` and provides the single role predicate every admin-gated
//! handler shares.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::warn;

/// The role marker required for administrative operations.
pub const ADMIN_ROLE: &str = "Admin";

/// Header carrying the gateway-verified JWT claims as JSON.
pub const CLAIMS_HEADER: &str = "x-jwt-claims";

//=========================================================================================
// Claims
//=========================================================================================

/// The subset of JWT claims the handlers care about.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub username: Option<String>,
    pub roles: Vec<String>,
}

/// Raw claim keys as the identity provider emits them. The role list
/// arrives JSON-encoded inside a string claim.
#[derive(Deserialize)]
struct RawClaims {
    #[serde(rename = "cognito:username")]
    cognito_username: Option<String>,
    username: Option<String>,
    #[serde(rename = "custom:role")]
    role: Option<String>,
}

impl Claims {
    /// Parses the forwarded claims JSON. Returns `None` when the payload is
    /// not a claims object at all; a present-but-unparsable role list is
    /// treated as "no roles".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw: RawClaims = serde_json::from_str(raw).ok()?;
        let roles = match raw.role.as_deref() {
            Some(encoded) => serde_json::from_str::<Vec<String>>(encoded).unwrap_or_default(),
            None => Vec::new(),
        };
        Some(Claims {
            username: raw.cognito_username.or(raw.username),
            roles,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// The authentication context attached to every request: `None` for
/// anonymous callers.
#[derive(Debug, Clone, Default)]
pub struct AuthContext(pub Option<Claims>);

impl AuthContext {
    pub fn claims(&self) -> Option<&Claims> {
        self.0.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.claims().map(Claims::is_admin).unwrap_or(false)
    }
}

fn claims_from_headers(headers: &HeaderMap) -> Option<Claims> {
    let raw = headers.get(CLAIMS_HEADER)?.to_str().ok()?;
    let claims = Claims::parse(raw);
    if claims.is_none() {
        warn!("Caught error: could not parse forwarded claims header");
    }
    claims
}

/// Middleware that attaches the caller's `AuthContext` to the request.
///
/// Never rejects: submission endpoints accept anonymous callers, and the
/// admin-gated handlers enforce their own role checks.
pub async fn attach_claims(mut req: Request, next: Next) -> Response {
    let ctx = AuthContext(claims_from_headers(req.headers()));
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_username_and_role_list() {
        let claims = Claims::parse(
            r#"{"cognito:username": "alice", "custom:role": "[\"Admin\",\"User\"]"}"#,
        )
        .unwrap();
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert!(claims.is_admin());
        assert!(claims.has_role("User"));
    }

    #[test]
    fn falls_back_to_plain_username_claim() {
        let claims = Claims::parse(r#"{"username": "bob"}"#).unwrap();
        assert_eq!(claims.username.as_deref(), Some("bob"));
        assert!(claims.roles.is_empty());
        assert!(!claims.is_admin());
    }

    #[test]
    fn garbled_role_list_means_no_roles() {
        let claims = Claims::parse(r#"{"username": "eve", "custom:role": "not json"}"#).unwrap();
        assert!(!claims.is_admin());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(Claims::parse("[]").is_none());
        assert!(Claims::parse("not json").is_none());
    }

    #[test]
    fn anonymous_context_is_never_admin() {
        assert!(!AuthContext::default().is_admin());
    }
}
