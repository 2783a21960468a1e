//! src/services/auth_service.rs
//!
//! AuthService: registration, login, profile edits and access tokens.
//! Passwords are bcrypt-hashed on the blocking pool; tokens are HS256 JWTs.

use crate::models::user::{Principal, Role, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const USER_COLUMNS: &str =
    "id, login, email, password_hash, role, is_active, is_verified, created_at";

/// bcrypt work factor for stored passwords.
const PASSWORD_HASH_COST: u32 = 10;
const MIN_PASSWORD_LEN: usize = 6;

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub role: Role,
    pub is_active: bool,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub login: String,
    pub email: String,
    pub password: String,
}

/// Profile edit. Empty strings count as "unchanged".
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub login: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub old_password: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("a user with this login or email already exists")]
    UserExists,
    #[error("invalid login or password")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("the current password is required to set a new one")]
    OldPasswordRequired,
    #[error("the current password is incorrect")]
    WrongOldPassword,
    #[error("account is deactivated")]
    Inactive,
    #[error("missing access token")]
    MissingToken,
    #[error("invalid or expired access token")]
    InvalidToken,
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Clone)]
struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

#[derive(Clone)]
pub struct AuthService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
    keys: Arc<TokenKeys>,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(db: Arc<SqlitePool>, secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            db,
            keys: Arc::new(TokenKeys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                ttl: Duration::hours(token_ttl_hours),
            }),
            hash_cost: PASSWORD_HASH_COST,
        }
    }

    /// Cheapest bcrypt cost, to keep tests fast.
    #[cfg(test)]
    pub fn with_min_hash_cost(mut self) -> Self {
        self.hash_cost = 4;
        self
    }

    pub fn issue_token(&self, user: &User) -> AuthResult<String> {
        let exp = (Utc::now() + self.keys.ttl).timestamp().max(0) as usize;
        let claims = Claims {
            user_id: user.id,
            role: user.role,
            is_active: user.is_active,
            exp,
        };
        encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_token(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.keys.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("rejected access token: {}", err);
                AuthError::InvalidToken
            })
    }

    /// Resolve a bearer token to the current caller.
    ///
    /// Role and activity come from the database, so role changes and
    /// deactivation apply to tokens issued earlier.
    pub async fn authenticate(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.verify_token(token)?;
        let user = self
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(Principal {
            user_id: user.id,
            role: user.role,
        })
    }

    pub async fn find_by_id(&self, user_id: i64) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(user)
    }

    async fn hash_password(&self, password: String) -> AuthResult<String> {
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    async fn verify_password(&self, password: String, hash: String) -> AuthResult<bool> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    /// True when another account (other than `except`) holds the login or email.
    async fn identity_taken(
        &self,
        login: &str,
        email: &str,
        except: Option<i64>,
    ) -> AuthResult<bool> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE (login = ? OR email = ?) AND id <> ?",
        )
        .bind(login)
        .bind(email)
        .bind(except.unwrap_or(-1))
        .fetch_one(&*self.db)
        .await?;
        Ok(taken > 0)
    }

    /// Create a USER account and return it with a fresh token.
    pub async fn register(&self, registration: Registration) -> AuthResult<(User, String)> {
        let login = registration.login.trim();
        let email = registration.email.trim();
        validate_identity(login, email)?;
        validate_password(&registration.password)?;

        if self.identity_taken(login, email, None).await? {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hash_password(registration.password).await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (login, email, password_hash, role, is_active, is_verified, created_at)
             VALUES (?, ?, ?, 'USER', 1, 0, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(login)
        .bind(email)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AuthError::UserExists
            } else {
                AuthError::Sqlx(err)
            }
        })?;

        info!(user_id = user.id, "user registered");
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Check credentials and return the user with a fresh token.
    pub async fn login(&self, login: &str, password: &str) -> AuthResult<(User, String)> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE login = ?"
        ))
        .bind(login.trim())
        .fetch_optional(&*self.db)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        debug!(user_id = user.id, "user logged in");
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Change login, email and/or password of the caller.
    pub async fn update_profile(
        &self,
        actor: &Principal,
        update: ProfileUpdate,
    ) -> AuthResult<User> {
        let user = self
            .find_by_id(actor.user_id)
            .await?
            .ok_or(AuthError::UserNotFound(actor.user_id))?;

        let new_password = update.password.filter(|p| !p.is_empty());
        if let Some(password) = &new_password {
            validate_password(password)?;
            let old = update
                .old_password
                .filter(|p| !p.is_empty())
                .ok_or(AuthError::OldPasswordRequired)?;
            if !self
                .verify_password(old, user.password_hash.clone())
                .await?
            {
                return Err(AuthError::WrongOldPassword);
            }
        }

        let login = non_blank(update.login).unwrap_or_else(|| user.login.clone());
        let email = non_blank(update.email).unwrap_or_else(|| user.email.clone());
        validate_identity(&login, &email)?;
        if self.identity_taken(&login, &email, Some(user.id)).await? {
            return Err(AuthError::UserExists);
        }

        let password_hash = match new_password {
            Some(password) => self.hash_password(password).await?,
            None => user.password_hash.clone(),
        };

        let updated = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET login = ?, email = ?, password_hash = ?
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&login)
        .bind(&email)
        .bind(&password_hash)
        .bind(user.id)
        .fetch_one(&*self.db)
        .await?;

        info!(user_id = updated.id, "profile updated");
        Ok(updated)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_identity(login: &str, email: &str) -> AuthResult<()> {
    if login.is_empty() || login.len() > 64 {
        return Err(AuthError::Validation(
            "login must be between 1 and 64 characters".into(),
        ));
    }
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AuthError::Validation("email is not valid".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Return true if SQLx error indicates a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
