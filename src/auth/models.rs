//! Authentication Models
//! Mission: Define secure user, claim, and principal data structures

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub active: bool,
    pub created_at: String,
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin, // Full access including user management
    #[serde(rename = "operator")]
    Operator, // Read access to user listings + own profile
    #[serde(rename = "viewer")]
    Viewer, // Own profile only
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Static permission set granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &[
                Permission::ProfileRead,
                Permission::ProfileWrite,
                Permission::UsersRead,
                Permission::UsersManage,
            ],
            Role::Operator => &[
                Permission::ProfileRead,
                Permission::ProfileWrite,
                Permission::UsersRead,
            ],
            Role::Viewer => &[Permission::ProfileRead, Permission::ProfileWrite],
        }
    }
}

/// Fine-grained capabilities derived from roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ProfileRead,
    ProfileWrite,
    UsersRead,
    UsersManage,
}

/// JWT Claims payload.
///
/// `typ` is absent on access tokens and `"refresh"` on refresh tokens; the
/// verifier enforces the distinction on top of the split signing secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    pub iat: usize, // issued-at timestamp
    pub exp: usize, // expiration timestamp
}

/// Verified identity attached to a request after token verification.
///
/// Immutable for the request's lifetime; never persisted.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            id,
            email: claims.email.clone(),
            role: claims.role,
            permissions: claims.role.permissions().to_vec(),
        })
    }

    /// Fails with `Forbidden` unless every required permission is granted.
    pub fn require_permissions(&self, required: &[Permission]) -> Result<(), AuthError> {
        if required.iter().all(|p| self.permissions.contains(p)) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Capability check: the principal owns the resource or holds the
    /// administrative role. Does not load the resource.
    pub fn require_ownership(&self, owner_id: Uuid) -> Result<(), AuthError> {
        if self.id == owner_id || self.role == Role::Admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Raw bearer token carried through the request so logout can revoke it.
#[derive(Debug, Clone)]
pub struct BearerContext {
    pub token: String,
    pub expires_at: i64,
}

/// Register request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request body
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Change-password request body
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Access/refresh pair returned by login, register, and refresh
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str, // always "Bearer"
    pub expires_in: i64,          // access-token lifetime in seconds
}

/// Login/register response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
}

impl UserProfile {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            active: user.active,
            created_at: user.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_claims(role: Role) -> Claims {
        Claims {
            sub: Uuid::new_v4().to_string(),
            email: "alice@example.com".to_string(),
            role,
            typ: None,
            iat: Utc::now().timestamp() as usize,
            exp: (Utc::now().timestamp() + 3600) as usize,
        }
    }

    #[test]
    fn test_role_serialization() {
        let admin = Role::Admin;
        let json = serde_json::to_string(&admin).unwrap();
        assert_eq!(json, r#""admin""#);

        let operator: Role = serde_json::from_str(r#""operator""#).unwrap();
        assert_eq!(operator, Role::Operator);
    }

    #[test]
    fn test_role_string_conversion() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::from_str("VIEWER"), Some(Role::Viewer));
        assert_eq!(Role::from_str("invalid"), None);
    }

    #[test]
    fn test_role_permission_sets() {
        assert!(Role::Admin.permissions().contains(&Permission::UsersManage));
        assert!(!Role::Operator
            .permissions()
            .contains(&Permission::UsersManage));
        assert!(Role::Operator.permissions().contains(&Permission::UsersRead));
        assert!(!Role::Viewer.permissions().contains(&Permission::UsersRead));
        assert!(Role::Viewer.permissions().contains(&Permission::ProfileRead));
    }

    #[test]
    fn test_principal_from_claims() {
        let claims = test_claims(Role::Operator);
        let principal = Principal::from_claims(&claims).unwrap();
        assert_eq!(principal.email, "alice@example.com");
        assert_eq!(principal.role, Role::Operator);
        assert!(principal.permissions.contains(&Permission::UsersRead));
    }

    #[test]
    fn test_principal_from_claims_rejects_bad_subject() {
        let mut claims = test_claims(Role::Viewer);
        claims.sub = "not-a-uuid".to_string();
        assert!(matches!(
            Principal::from_claims(&claims),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_require_permissions() {
        let principal = Principal::from_claims(&test_claims(Role::Viewer)).unwrap();
        assert!(principal
            .require_permissions(&[Permission::ProfileRead])
            .is_ok());
        assert!(matches!(
            principal.require_permissions(&[Permission::UsersManage]),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn test_require_ownership() {
        let principal = Principal::from_claims(&test_claims(Role::Viewer)).unwrap();
        assert!(principal.require_ownership(principal.id).is_ok());
        assert!(matches!(
            principal.require_ownership(Uuid::new_v4()),
            Err(AuthError::Forbidden)
        ));

        // Admin may act on any resource.
        let admin = Principal::from_claims(&test_claims(Role::Admin)).unwrap();
        assert!(admin.require_ownership(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_user_profile_omits_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "bob@example.com".to_string(),
            password_hash: "secret-hash".to_string(),
            role: Role::Viewer,
            active: true,
            created_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string(&UserProfile::from_user(&user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("bob@example.com"));
    }
}
