//! Authentication & Session Control
//!
//! Token issuance and verification, refresh rotation, cache-backed
//! revocation, role/permission authorization, and the HTTP credential
//! lifecycle (register, login, refresh, logout, profile, change-password).

pub mod api;
pub mod cache;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod revocation;
pub mod user_store;

pub use api::{build_router, AuthState};
pub use cache::{MemoryCache, RedisCache, SessionStore, VolatileCache};
pub use jwt::TokenService;
pub use middleware::{auth_middleware, require_role, AllowedRoles};
pub use models::{Claims, Permission, Principal, Role, User};
pub use revocation::RevocationGuard;
pub use user_store::UserStore;
