//! Runtime Configuration
//! Mission: Make every secret, TTL, and limit injectable - nothing hard-coded

use std::env;
use std::path::PathBuf;

/// Configuration for the auth subsystem, read once at startup.
///
/// Everything here comes from the environment with development defaults;
/// production deployments override via `.env` or the process environment.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing access tokens.
    pub access_secret: String,
    /// Secret for signing refresh tokens. Distinct from the access secret so
    /// compromise of one token class does not compromise the other.
    pub refresh_secret: String,
    /// Access-token lifetime in seconds (default 1h).
    pub access_ttl_secs: i64,
    /// Refresh-token lifetime in seconds (default 7 days).
    pub refresh_ttl_secs: i64,
    /// bcrypt cost factor for password hashing.
    pub bcrypt_cost: u32,
    /// Max requests per principal per window.
    pub rate_limit_max_requests: u32,
    /// Rate-limit window in seconds.
    pub rate_limit_window_secs: u64,
    /// Upper bound on distinct principals tracked by the in-process limiter.
    pub rate_limit_max_tracked: usize,
    /// When true, treat revocation-cache outages as hard failures instead of
    /// failing open.
    pub revocation_fail_closed: bool,
    /// Bound on any single cache call.
    pub cache_timeout_ms: u64,
    /// Session-snapshot TTL in seconds (advisory cache).
    pub session_ttl_secs: u64,
    /// Redis URL for the revocation cache; in-memory fallback when unset.
    pub redis_url: Option<String>,
    /// SQLite path for the credential store.
    pub db_path: String,
    pub bind_addr: String,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let access_secret = env::var("ACCESS_TOKEN_SECRET").unwrap_or_else(|_| {
            "dev-access-secret-change-in-production-minimum-32-characters".to_string()
        });
        let refresh_secret = env::var("REFRESH_TOKEN_SECRET").unwrap_or_else(|_| {
            "dev-refresh-secret-change-in-production-minimum-32-characters".to_string()
        });

        Self {
            access_secret,
            refresh_secret,
            access_ttl_secs: env_parse("ACCESS_TOKEN_TTL_SECS", 3600),
            refresh_ttl_secs: env_parse("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 3600),
            bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            rate_limit_max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 100),
            rate_limit_window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_max_tracked: env_parse("RATE_LIMIT_MAX_TRACKED_USERS", 10_000),
            revocation_fail_closed: env::var("REVOCATION_FAIL_CLOSED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            cache_timeout_ms: env_parse("CACHE_TIMEOUT_MS", 200),
            session_ttl_secs: env_parse("SESSION_TTL_SECS", 3600),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            db_path: resolve_data_path(env::var("AUTH_DB_PATH").ok(), "gatekeeper_auth.db"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Truthy env-flag values: "1", "true", "on" (any case).
pub fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "on" | "ON")
}

/// Resolve a data-file path. Relative paths are anchored at the crate
/// directory, not the caller's cwd, so running from elsewhere doesn't
/// accidentally create a new empty DB.
fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return base.join(default_filename).to_string_lossy().to_string();
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }
    base.join(p).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(parse_flag("ON"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_resolve_data_path_absolute_passthrough() {
        let p = resolve_data_path(Some("/tmp/auth.db".to_string()), "default.db");
        assert_eq!(p, "/tmp/auth.db");
    }

    #[test]
    fn test_resolve_data_path_relative_anchored_to_crate() {
        let p = resolve_data_path(Some("data/auth.db".to_string()), "default.db");
        assert!(p.ends_with("data/auth.db"));
        assert!(p.starts_with(env!("CARGO_MANIFEST_DIR")));
    }

    #[test]
    fn test_resolve_data_path_default() {
        let p = resolve_data_path(None, "gatekeeper_auth.db");
        assert!(p.ends_with("gatekeeper_auth.db"));
    }
}
