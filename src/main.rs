//! Gatekeeper - Authentication & Session Control Service
//! Mission: Issue, verify, rotate, and revoke credentials for the platform

use anyhow::{Context, Result};
use dotenv::dotenv;
use gatekeeper_backend::auth::cache::{MemoryCache, RedisCache, SessionStore, VolatileCache};
use gatekeeper_backend::auth::revocation::RevocationGuard;
use gatekeeper_backend::auth::{build_router, AuthState, Role, TokenService, UserStore};
use gatekeeper_backend::config::AuthConfig;
use gatekeeper_backend::error::AuthError;
use gatekeeper_backend::middleware::rate_limit::{RateLimitConfig, UserRateLimiter};
use gatekeeper_backend::middleware::request_logging;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🚀 Gatekeeper Auth Service Starting");

    let config = AuthConfig::from_env();

    let user_store = Arc::new(
        UserStore::new(&config.db_path, config.bcrypt_cost)
            .context("Failed to initialize user store")?,
    );
    info!("🔐 Credential store initialized at: {}", config.db_path);

    seed_admin(&user_store)?;

    // Revocation cache: Redis when configured, in-memory otherwise. The
    // in-memory fallback loses blacklist state on restart, acceptable for
    // development only.
    let cache: Arc<dyn VolatileCache> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(redis) => {
                info!("📦 Revocation cache: Redis at {}", url);
                Arc::new(redis)
            }
            Err(e) => {
                warn!(error = %e, "⚠️  Redis unavailable - falling back to in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        None => {
            info!("📦 Revocation cache: in-memory (REDIS_URL not set)");
            Arc::new(MemoryCache::new())
        }
    };

    let cache_timeout = Duration::from_millis(config.cache_timeout_ms);
    let revocation = Arc::new(RevocationGuard::new(
        cache.clone(),
        cache_timeout,
        config.revocation_fail_closed,
    ));
    let sessions = SessionStore::new(
        cache,
        cache_timeout,
        Duration::from_secs(config.session_ttl_secs),
    );
    let tokens = Arc::new(TokenService::from_config(&config));

    let state = AuthState {
        user_store,
        tokens,
        revocation,
        sessions,
    };

    let limiter = UserRateLimiter::new(RateLimitConfig {
        max_requests: config.rate_limit_max_requests,
        window: Duration::from_secs(config.rate_limit_window_secs),
        max_tracked: config.rate_limit_max_tracked,
    });

    // Periodic sweep of idle principals from the limiter.
    let cleanup_limiter = limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let app = build_router(state, limiter)
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 Auth API listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Create the bootstrap admin account when both seed variables are set.
/// Re-running against an existing account is a no-op.
fn seed_admin(store: &UserStore) -> Result<()> {
    let (Ok(email), Ok(password)) = (env::var("SEED_ADMIN_EMAIL"), env::var("SEED_ADMIN_PASSWORD"))
    else {
        return Ok(());
    };

    match store.create_user(&email, &password, Role::Admin) {
        Ok(user) => info!(user_id = %user.id, "👑 Seeded admin account"),
        Err(AuthError::Conflict) => info!("👑 Admin account already exists"),
        Err(e) => return Err(anyhow::anyhow!(e).context("Failed to seed admin account")),
    }
    Ok(())
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory .env (common when running with
    // --manifest-path from elsewhere)
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
