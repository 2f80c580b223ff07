//! JWT Token Service
//! Mission: Issue and verify access/refresh tokens securely

use crate::auth::models::{Claims, TokenPair, User};
use crate::config::AuthConfig;
use crate::error::AuthError;
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

const REFRESH_TYP: &str = "refresh";

/// Token service for issuing and verifying signed tokens.
///
/// Access and refresh tokens are signed with independent secrets so that
/// compromise of one class does not compromise the other, and a refresh
/// token can never be replayed as an access token.
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.access_secret.clone(),
            config.refresh_secret.clone(),
            config.access_ttl_secs,
            config.refresh_ttl_secs,
        )
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issue a short-lived access token for a user.
    /// Pure function of the user, configuration, and clock.
    pub fn issue_access_token(&self, user: &User) -> Result<String> {
        self.issue(user, &self.access_secret, self.access_ttl_secs, None)
    }

    /// Issue a longer-lived refresh token, marked with `typ: "refresh"`.
    pub fn issue_refresh_token(&self, user: &User) -> Result<String> {
        self.issue(
            user,
            &self.refresh_secret,
            self.refresh_ttl_secs,
            Some(REFRESH_TYP.to_string()),
        )
    }

    /// Issue an access/refresh pair.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(user)?,
            token_type: "Bearer",
            expires_in: self.access_ttl_secs,
        })
    }

    fn issue(&self, user: &User, secret: &str, ttl_secs: i64, typ: Option<String>) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::seconds(ttl_secs))
            .context("Invalid timestamp")?
            .timestamp();

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            typ,
            iat: now.timestamp() as usize,
            exp: expiration as usize,
        };

        debug!(
            user_id = %user.id,
            ttl_secs,
            "Issuing {} token",
            if claims.typ.is_some() { "refresh" } else { "access" }
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .context("Failed to sign token")
    }

    /// Verify an access token's signature and expiry.
    ///
    /// Fails with `TokenExpired` past `exp`, `InvalidToken` on any other
    /// signature/format problem, including a refresh token presented here.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = Self::verify(token, &self.access_secret)?;
        if claims.typ.is_some() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Verify a refresh token; requires `typ == "refresh"`.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = Self::verify(token, &self.refresh_secret)?;
        if claims.typ.as_deref() != Some(REFRESH_TYP) {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    fn verify(token: &str, secret: &str) -> Result<Claims, AuthError> {
        // Expiry boundaries matter here: zero leeway so `exp = now - 1s`
        // fails and `exp = now + 1s` passes.
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        Ok(decoded.claims)
    }
}
