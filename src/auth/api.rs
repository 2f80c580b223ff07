//! Auth HTTP Surface
//! Mission: Credential lifecycle endpoints wired onto one router

use crate::auth::cache::{SessionSnapshot, SessionStore};
use crate::auth::jwt::TokenService;
use crate::auth::middleware::{auth_middleware, require_role, AllowedRoles};
use crate::auth::models::{
    AuthResponse, BearerContext, ChangePasswordRequest, LoginRequest, Permission, Principal,
    RefreshRequest, RegisterRequest, Role, UserProfile,
};
use crate::auth::revocation::RevocationGuard;
use crate::auth::user_store::UserStore;
use crate::error::AuthError;
use crate::middleware::rate_limit::{rate_limit_middleware, UserRateLimiter};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared state for all auth routes and middleware.
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub tokens: Arc<TokenService>,
    pub revocation: Arc<RevocationGuard>,
    pub sessions: SessionStore,
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let trimmed = email.trim();
    if trimmed.len() < 5 || !trimmed.contains('@') || !trimmed.contains('.') {
        return Err(AuthError::validation("email", "Invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::validation(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// POST /api/auth/register
///
/// New accounts always start as viewers; role escalation is an admin
/// operation, never a registration input.
async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let email = payload.email.trim().to_lowercase();
    let user = state
        .user_store
        .create_user(&email, &payload.password, Role::Viewer)?;

    let tokens = state.tokens.issue_pair(&user).map_err(AuthError::Internal)?;

    info!(user_id = %user.id, "✅ User registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserProfile::from_user(&user),
            tokens,
        }),
    ))
}

/// POST /api/auth/login
///
/// Unknown email, wrong password, and inactive account all produce the
/// same `invalid_credentials` response.
async fn login(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = payload.email.trim().to_lowercase();

    let user = state
        .user_store
        .find_by_email(&email)
        .map_err(AuthError::Internal)?
        .filter(|u| u.active)
        .ok_or(AuthError::InvalidCredentials)?;

    let verified = bcrypt::verify(&payload.password, &user.password_hash)
        .map_err(|e| AuthError::Internal(anyhow::Error::new(e)))?;
    if !verified {
        return Err(AuthError::InvalidCredentials);
    }

    let tokens = state.tokens.issue_pair(&user).map_err(AuthError::Internal)?;

    // Advisory session snapshot; login succeeds even if the cache is down.
    state
        .sessions
        .write(&SessionSnapshot {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            login_time: Utc::now().to_rfc3339(),
            ip: client_ip(&headers),
        })
        .await;

    info!(user_id = %user.id, "✅ User logged in");
    Ok(Json(AuthResponse {
        user: UserProfile::from_user(&user),
        tokens,
    }))
}

/// POST /api/auth/refresh
///
/// Rotation: every refresh issues a fresh pair and revokes the presented
/// refresh token for its remaining lifetime, so each one is single-use.
async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if state.revocation.is_revoked(&payload.refresh_token).await? {
        return Err(AuthError::TokenRevoked);
    }

    let claims = state.tokens.verify_refresh_token(&payload.refresh_token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    // Re-check the account: a deactivated or deleted user cannot keep a
    // session alive through rotation.
    let user = state
        .user_store
        .find_by_id(user_id)
        .map_err(AuthError::Internal)?
        .filter(|u| u.active)
        .ok_or(AuthError::InvalidCredentials)?;

    let tokens = state.tokens.issue_pair(&user).map_err(AuthError::Internal)?;

    state
        .revocation
        .revoke(
            &payload.refresh_token,
            RevocationGuard::remaining_ttl(claims.exp as i64),
        )
        .await?;

    info!(user_id = %user.id, "🔄 Token pair rotated");
    Ok(Json(tokens))
}

/// POST /api/auth/logout
///
/// Blacklists the presented access token for its remaining lifetime.
/// Always succeeds for an authenticated caller: a cache outage downgrades
/// to signature-expiry semantics rather than failing the logout.
async fn logout(
    State(state): State<AuthState>,
    Extension(principal): Extension<Principal>,
    Extension(bearer): Extension<BearerContext>,
) -> Result<impl IntoResponse, AuthError> {
    let ttl = RevocationGuard::remaining_ttl(bearer.expires_at);
    if let Err(e) = state.revocation.revoke(&bearer.token, ttl).await {
        warn!(error = %e, "Logout could not reach revocation cache");
    }

    state.sessions.clear(&principal.id.to_string()).await;

    info!(user_id = %principal.id, "👋 User logged out");
    Ok(Json(json!({ "message": "Logged out" })))
}

/// GET /api/auth/profile
async fn profile(
    State(state): State<AuthState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AuthError> {
    principal.require_permissions(&[Permission::ProfileRead])?;

    let user = state
        .user_store
        .find_by_id(principal.id)
        .map_err(AuthError::Internal)?
        .ok_or(AuthError::InvalidCredentials)?;

    Ok(Json(UserProfile::from_user(&user)))
}

/// POST /api/auth/change-password
async fn change_password(
    State(state): State<AuthState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    principal.require_permissions(&[Permission::ProfileWrite])?;
    validate_password(&payload.new_password)?;

    let user = state
        .user_store
        .find_by_id(principal.id)
        .map_err(AuthError::Internal)?
        .ok_or(AuthError::InvalidCredentials)?;

    let verified = bcrypt::verify(&payload.current_password, &user.password_hash)
        .map_err(|e| AuthError::Internal(anyhow::Error::new(e)))?;
    if !verified {
        return Err(AuthError::InvalidCredentials);
    }

    state
        .user_store
        .update_password(user.id, &payload.new_password)
        .map_err(AuthError::Internal)?;

    info!(user_id = %user.id, "🔑 Password changed");
    Ok(Json(json!({ "message": "Password updated" })))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AuthState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AuthError> {
    principal.require_permissions(&[Permission::UsersRead])?;

    let users = state
        .user_store
        .list_users()
        .map_err(AuthError::Internal)?
        .iter()
        .map(UserProfile::from_user)
        .collect::<Vec<_>>();

    Ok(Json(users))
}

/// DELETE /api/admin/users/:id
///
/// Idempotent: deleting an unknown id still returns 204. Self-deletion is
/// rejected so an instance can't lose its last admin by accident.
async fn delete_user(
    State(state): State<AuthState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    principal.require_permissions(&[Permission::UsersManage])?;

    let user_id =
        Uuid::parse_str(&id).map_err(|_| AuthError::validation("id", "Invalid user id"))?;

    if user_id == principal.id {
        return Err(AuthError::Forbidden);
    }

    state
        .user_store
        .delete_user(user_id)
        .map_err(AuthError::Internal)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Build the full auth router.
///
/// Layer order on protected routes: auth runs first (outermost), then the
/// role gate where present, then the per-user rate limiter.
pub fn build_router(state: AuthState, limiter: UserRateLimiter) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/profile", get(profile))
        .route("/api/auth/change-password", post(change_password))
        .route_layer(from_fn_with_state(limiter.clone(), rate_limit_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let admin = Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", delete(delete_user))
        .route_layer(from_fn_with_state(limiter, rate_limit_middleware))
        .route_layer(from_fn_with_state(
            AllowedRoles(&[Role::Admin]),
            require_role,
        ))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    public.merge(protected).merge(admin)
}
