//! Token Revocation
//! Mission: Blacklist tokens until natural expiry, never block on the cache

use crate::auth::cache::VolatileCache;
use crate::error::AuthError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Revocation guard backed by the volatile cache.
///
/// Tokens are stored by SHA-256 hash so the cache never holds a usable
/// credential. Entries carry a TTL equal to the token's remaining lifetime;
/// after natural expiry the verifier rejects the token anyway, so the
/// blacklist stays small.
///
/// Cache failures follow a configured availability policy: fail-open
/// (degrade to signature-only verification, the default) or fail-closed
/// (reject while the cache is unreachable).
pub struct RevocationGuard {
    cache: Arc<dyn VolatileCache>,
    timeout: Duration,
    fail_closed: bool,
}

impl RevocationGuard {
    pub fn new(cache: Arc<dyn VolatileCache>, timeout: Duration, fail_closed: bool) -> Self {
        Self {
            cache,
            timeout,
            fail_closed,
        }
    }

    fn key(token: &str) -> String {
        format!("blacklist:{}", hex::encode(Sha256::digest(token.as_bytes())))
    }

    /// Check whether a token has been revoked.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, AuthError> {
        let key = Self::key(token);
        let lookup = self.cache.get(&key);
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(hit)) => Ok(hit.is_some()),
            Ok(Err(e)) => self.degraded("revocation check", e).map(|_| false),
            Err(_) => self
                .degraded("revocation check", anyhow::anyhow!("cache timeout"))
                .map(|_| false),
        }
    }

    /// Revoke a token for `ttl` seconds. Idempotent: re-revoking refreshes
    /// the entry's TTL, which never outlives the token by more than the
    /// remaining lifetime passed in.
    pub async fn revoke(&self, token: &str, ttl_secs: u64) -> Result<(), AuthError> {
        let key = Self::key(token);
        let write = self
            .cache
            .put(&key, "revoked", Duration::from_secs(ttl_secs.max(1)));

        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => {
                info!(ttl_secs, "Token revoked");
                Ok(())
            }
            Ok(Err(e)) => self.degraded("revocation write", e),
            Err(_) => self.degraded("revocation write", anyhow::anyhow!("cache timeout")),
        }
    }

    /// Seconds until the `exp` timestamp, floored at 1 so a revocation
    /// entry always exists long enough to cover clock skew at the boundary.
    pub fn remaining_ttl(exp: i64) -> u64 {
        (exp - Utc::now().timestamp()).max(1) as u64
    }

    fn degraded(&self, op: &str, err: anyhow::Error) -> Result<(), AuthError> {
        if self.fail_closed {
            Err(AuthError::Cache(err.context(format!("{op} failed"))))
        } else {
            warn!(error = %err, "Cache unavailable during {op}; failing open");
            Ok(())
        }
    }
}
