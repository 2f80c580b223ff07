//! Auth Middleware
//! Mission: Verify bearer tokens and enforce roles before handlers run

use crate::auth::api::AuthState;
use crate::auth::models::{BearerContext, Principal, Role};
use crate::error::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Extract the bearer token from the Authorization header.
fn bearer_token(request: &Request) -> Result<String, AuthError> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .ok_or(AuthError::MissingToken)
}

/// Bearer-token verification for protected routes.
///
/// Revocation is checked before signature verification so a blacklisted
/// token reports `token_revoked` rather than leaking whether its signature
/// still validates. On success the request carries a `Principal` and the
/// raw `BearerContext` (logout needs the token to revoke it).
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request)?;

    if state.revocation.is_revoked(&token).await? {
        debug!("Rejected revoked token");
        return Err(AuthError::TokenRevoked);
    }

    let claims = state.tokens.verify_access_token(&token)?;
    let principal = Principal::from_claims(&claims)?;

    debug!(user_id = %principal.id, role = principal.role.as_str(), "Authenticated request");

    request.extensions_mut().insert(BearerContext {
        token,
        expires_at: claims.exp as i64,
    });
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Role allow-list for a route group, applied after `auth_middleware`.
#[derive(Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

pub async fn require_role(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or(AuthError::MissingToken)?;

    if !allowed.0.contains(&principal.role) {
        debug!(
            user_id = %principal.id,
            role = principal.role.as_str(),
            "Role not permitted for this route group"
        );
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/auth/profile");
        if let Some(v) = value {
            builder = builder.header("Authorization", v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = request_with_auth(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header_rejected() {
        let req = request_with_auth(None);
        assert!(matches!(bearer_token(&req), Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        let req = request_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(bearer_token(&req), Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_empty_bearer_rejected() {
        let req = request_with_auth(Some("Bearer "));
        assert!(matches!(bearer_token(&req), Err(AuthError::MissingToken)));
    }
}
