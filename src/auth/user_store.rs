//! User Storage
//! Mission: Securely store and manage user accounts with SQLite

use crate::auth::models::{Role, User};
use crate::error::AuthError;
use anyhow::{Context, Result};
use bcrypt::hash;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use tracing::info;
use uuid::Uuid;

/// Credential store with SQLite backend.
///
/// Email uniqueness is enforced by a UNIQUE index rather than an
/// application-level pre-check, so concurrent registrations of the same
/// email resolve at insert time: one wins, the other gets `Conflict`.
pub struct UserStore {
    db_path: String,
    bcrypt_cost: u32,
}

impl UserStore {
    /// Create a new user store and initialize the schema.
    pub fn new(db_path: &str, bcrypt_cost: u32) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            bcrypt_cost,
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Create a new user. Maps the UNIQUE-index violation to `Conflict`.
    pub fn create_user(&self, email: &str, password: &str, role: Role) -> Result<User, AuthError> {
        let password_hash = hash(password, self.bcrypt_cost)
            .context("Failed to hash password")
            .map_err(AuthError::Internal)?;

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            role,
            active: true,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = Connection::open(&self.db_path)
            .context("Failed to open user database")
            .map_err(AuthError::Internal)?;

        let inserted = conn.execute(
            "INSERT INTO users (id, email, password_hash, role, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.active as i64,
                user.created_at,
            ],
        );

        match inserted {
            Ok(_) => {
                info!(email = %user.email, role = user.role.as_str(), "User created");
                Ok(user)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(AuthError::Conflict)
            }
            Err(e) => Err(AuthError::Internal(
                anyhow::Error::new(e).context("Failed to insert user"),
            )),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = Connection::open(&self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, role, active, created_at
             FROM users WHERE email = ?1",
        )?;
        Self::query_one(&mut stmt, params![email])
    }

    pub fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let conn = Connection::open(&self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, role, active, created_at
             FROM users WHERE id = ?1",
        )?;
        Self::query_one(&mut stmt, params![user_id.to_string()])
    }

    fn query_one(
        stmt: &mut rusqlite::Statement<'_>,
        params: impl rusqlite::Params,
    ) -> Result<Option<User>> {
        let user_result = stmt.query_row(params, Self::row_to_user);
        match user_result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        let id_str: String = row.get(0)?;
        let role_str: String = row.get(3)?;
        let active: i64 = row.get(4)?;

        let id = Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(User {
            id,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            role: Role::from_str(&role_str).unwrap_or(Role::Viewer),
            active: active != 0,
            created_at: row.get(5)?,
        })
    }

    /// Re-hash and persist a new password for the user.
    pub fn update_password(&self, user_id: Uuid, new_password: &str) -> Result<()> {
        let password_hash =
            hash(new_password, self.bcrypt_cost).context("Failed to hash password")?;

        let conn = Connection::open(&self.db_path)?;
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id.to_string()],
        )?;

        if rows == 0 {
            anyhow::bail!("User not found");
        }
        info!(user_id = %user_id, "Password updated");
        Ok(())
    }

    /// List all users (admin surface).
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = Connection::open(&self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, role, active, created_at FROM users",
        )?;

        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Delete a user by id. Idempotent: deleting a missing user is a no-op.
    pub fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        let rows = conn.execute(
            "DELETE FROM users WHERE id = ?1",
            params![user_id.to_string()],
        )?;

        if rows > 0 {
            info!(user_id = %user_id, "User deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    // MIN_COST keeps hashing fast in tests. bcrypt doesn't export its
    // minimum cost constant, so the value (4) is inlined here.
    const MIN_COST: u32 = 4;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path, MIN_COST).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("alice@example.com", "password123", Role::Viewer)
            .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert!(user.active);

        let by_email = store.find_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = store.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(by_id.email, user.email);
    }

    #[test]
    fn test_password_is_hashed() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user("bob@example.com", "hunter22", Role::Viewer)
            .unwrap();

        assert_ne!(user.password_hash, "hunter22");
        assert!(bcrypt::verify("hunter22", &user.password_hash).unwrap());
        assert!(!bcrypt::verify("wrong", &user.password_hash).unwrap());
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let (store, _temp) = create_test_store();
        store
            .create_user("dup@example.com", "password1", Role::Viewer)
            .unwrap();

        let second = store.create_user("dup@example.com", "password2", Role::Viewer);
        assert!(matches!(second, Err(AuthError::Conflict)));

        // Case-insensitive uniqueness.
        let third = store.create_user("DUP@example.com", "password3", Role::Viewer);
        assert!(matches!(third, Err(AuthError::Conflict)));
    }

    #[test]
    fn test_update_password() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user("carol@example.com", "old-password", Role::Viewer)
            .unwrap();

        store.update_password(user.id, "new-password").unwrap();

        let updated = store.find_by_id(user.id).unwrap().unwrap();
        assert!(bcrypt::verify("new-password", &updated.password_hash).unwrap());
        assert!(!bcrypt::verify("old-password", &updated.password_hash).unwrap());
    }

    #[test]
    fn test_update_password_unknown_user_fails() {
        let (store, _temp) = create_test_store();
        assert!(store.update_password(Uuid::new_v4(), "whatever").is_err());
    }

    #[test]
    fn test_list_and_delete_users() {
        let (store, _temp) = create_test_store();
        let a = store
            .create_user("a@example.com", "password", Role::Admin)
            .unwrap();
        store
            .create_user("b@example.com", "password", Role::Viewer)
            .unwrap();

        assert_eq!(store.list_users().unwrap().len(), 2);

        store.delete_user(a.id).unwrap();
        assert_eq!(store.list_users().unwrap().len(), 1);

        // Idempotent.
        store.delete_user(a.id).unwrap();
    }

    #[test]
    fn test_unknown_email_returns_none() {
        let (store, _temp) = create_test_store();
        assert!(store.find_by_email("ghost@example.com").unwrap().is_none());
    }
}
