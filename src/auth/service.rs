//! Accounts and bearer tokens.
//!
//! Handlers depend on the [`AuthService`] trait only; [`SqliteAuthService`]
//! is the implementation wired up by the binary and the tests.

use rusqlite::{params, ErrorCode, OptionalExtension};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::session;
use crate::db::models::User;
use crate::state::DbPool;
use crate::validation::{
    validate_email, validate_password, validate_username, Errors, ValidationError,
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Body of `POST /api/auth/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Errors::new();
        errors.check(validate_username(&self.username));
        errors.check(validate_email(&self.email));
        errors.check(validate_password(&self.password));
        errors.finish(())
    }
}

pub trait AuthService: Send + Sync {
    /// Registers a new account. Username and email must both be unused.
    fn signup(&self, new: &NewUser) -> Result<User, AuthError>;

    /// Checks a username/password pair.
    fn verify(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Issues a bearer token for `user_id`.
    fn issue_token(&self, user_id: i64) -> Result<String, AuthError>;

    /// Resolves a bearer token to its user.
    fn authenticate(&self, token: &str) -> Result<User, AuthError>;
}

pub type DynAuthService = Arc<dyn AuthService>;

pub struct SqliteAuthService {
    pool: DbPool,
    token_hours: u64,
    bcrypt_cost: u32,
}

impl SqliteAuthService {
    pub fn new(pool: DbPool, token_hours: u64, bcrypt_cost: u32) -> Self {
        Self {
            pool,
            token_hours,
            bcrypt_cost,
        }
    }

    fn find_by_username(
        conn: &rusqlite::Connection,
        username: &str,
    ) -> rusqlite::Result<Option<User>> {
        conn.query_row(
            "SELECT id, username, email, password_hash FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                })
            },
        )
        .optional()
    }
}

/// Inserts an account row and returns its id.
///
/// A unique-constraint failure (a concurrent signup got there first) is
/// mapped to the column it hit.
fn insert_user(
    conn: &rusqlite::Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<i64, AuthError> {
    match conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, password_hash],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            if msg.is_some_and(|m| m.contains("users.email")) {
                Err(AuthError::EmailTaken)
            } else {
                Err(AuthError::UsernameTaken)
            }
        }
        Err(e) => Err(e.into()),
    }
}

impl AuthService for SqliteAuthService {
    fn signup(&self, new: &NewUser) -> Result<User, AuthError> {
        let conn = self.pool.get()?;

        let exists = |sql: &str, value: &str| -> rusqlite::Result<bool> {
            conn.query_row(sql, params![value], |row| row.get(0))
        };
        if exists("SELECT COUNT(*) > 0 FROM users WHERE username = ?1", &new.username)? {
            return Err(AuthError::UsernameTaken);
        }
        if exists("SELECT COUNT(*) > 0 FROM users WHERE email = ?1", &new.email)? {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = bcrypt::hash(&new.password, self.bcrypt_cost)?;
        let id = insert_user(&conn, &new.username, &new.email, &password_hash)?;

        let user = User {
            id,
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash,
        };
        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    fn verify(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let conn = self.pool.get()?;
        let user =
            Self::find_by_username(&conn, username)?.ok_or(AuthError::InvalidCredentials)?;
        if !bcrypt::verify(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        let conn = self.pool.get()?;
        let purged = session::purge_expired(&conn)?;
        if purged > 0 {
            tracing::debug!(purged, "Expired sessions removed");
        }
        Ok(session::create_session(&conn, user_id, self.token_hours)?)
    }

    fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let conn = self.pool.get()?;
        session::user_for_token(&conn, token)?.ok_or(AuthError::InvalidToken)
    }
}
