//! src/services/user_service.rs
//!
//! UserService: self-service role changes and identity verification
//! documents.

use crate::models::user::{Principal, Role, User, VerificationDocument, VerificationStatus};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user {0} not found")]
    NotFound(i64),
    #[error("role `{0:?}` cannot be requested")]
    InvalidRole(Role),
    #[error("at least one document is required")]
    NoDocuments,
    #[error("not allowed to act for user {0}")]
    Forbidden(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type UserResult<T> = Result<T, UserError>;

#[derive(Clone)]
pub struct UserService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl UserService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Switch between USER and OWNER. ADMIN is never self-assignable.
    pub async fn update_role(
        &self,
        actor: &Principal,
        user_id: i64,
        new_role: Role,
    ) -> UserResult<User> {
        if new_role == Role::Admin {
            return Err(UserError::InvalidRole(new_role));
        }
        if !actor.acts_for(user_id) {
            return Err(UserError::Forbidden(user_id));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = ? WHERE id = ? AND role <> 'ADMIN'
             RETURNING id, login, email, password_hash, role, is_active, is_verified, created_at",
        )
        .bind(new_role)
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(UserError::NotFound(user_id))?;

        info!(user_id, role = ?new_role, "role updated");
        Ok(user)
    }

    async fn ensure_exists(&self, user_id: i64) -> UserResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT is_verified FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(UserError::NotFound(user_id))
    }

    /// Record uploaded verification documents for later admin review.
    pub async fn add_verification_documents(
        &self,
        actor: &Principal,
        user_id: i64,
        file_urls: &[String],
    ) -> UserResult<Vec<VerificationDocument>> {
        if !actor.acts_for(user_id) {
            return Err(UserError::Forbidden(user_id));
        }
        if file_urls.is_empty() {
            return Err(UserError::NoDocuments);
        }
        self.ensure_exists(user_id).await?;

        let mut tx = self.db.begin().await?;
        let mut documents = Vec::with_capacity(file_urls.len());
        for url in file_urls {
            let doc = sqlx::query_as::<_, VerificationDocument>(
                "INSERT INTO verification_documents (user_id, file_url, uploaded_at)
                 VALUES (?, ?, ?)
                 RETURNING id, user_id, file_url, uploaded_at",
            )
            .bind(user_id)
            .bind(url)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
            documents.push(doc);
        }
        tx.commit().await?;

        info!(user_id, count = documents.len(), "verification documents uploaded");
        Ok(documents)
    }

    pub async fn verification_status(&self, user_id: i64) -> UserResult<VerificationStatus> {
        let is_verified = self.ensure_exists(user_id).await?;
        let documents = sqlx::query_as::<_, VerificationDocument>(
            "SELECT id, user_id, file_url, uploaded_at FROM verification_documents
             WHERE user_id = ? ORDER BY uploaded_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;

        Ok(VerificationStatus {
            is_verified,
            documents,
        })
    }
}
