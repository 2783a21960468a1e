//! src/services/review_service.rs
//!
//! ReviewService: one review per guest and listing; writing again updates it.

use crate::models::review::{Review, ReviewWithAuthor};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const MIN_RATING: i64 = 1;
const MAX_RATING: i64 = 5;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("property {0} not found")]
    PropertyNotFound(i64),
    #[error("rating must be between 1 and 5")]
    InvalidRating,
    #[error("owners cannot review their own property")]
    OwnProperty,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ReviewResult<T> = Result<T, ReviewError>;

/// Whether [`ReviewService::add_review`] inserted or overwrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct ReviewService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl ReviewService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn reviews_for_property(
        &self,
        property_id: i64,
    ) -> ReviewResult<Vec<ReviewWithAuthor>> {
        let reviews = sqlx::query_as::<_, ReviewWithAuthor>(
            "SELECT r.id, r.property_id, r.user_id, r.rating, r.comment, r.created_at,
                    u.login AS author_login
             FROM reviews r JOIN users u ON u.id = r.user_id
             WHERE r.property_id = ?
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(property_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(reviews)
    }

    /// Insert the user's review of a listing or replace the existing one.
    pub async fn add_review(
        &self,
        property_id: i64,
        user_id: i64,
        rating: i64,
        comment: &str,
    ) -> ReviewResult<(Review, ReviewOutcome)> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ReviewError::InvalidRating);
        }
        let owner_id: i64 = sqlx::query_scalar("SELECT owner_id FROM properties WHERE id = ?")
            .bind(property_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(ReviewError::PropertyNotFound(property_id))?;
        if owner_id == user_id {
            return Err(ReviewError::OwnProperty);
        }

        let existed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE property_id = ? AND user_id = ?)",
        )
        .bind(property_id)
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?;

        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (property_id, user_id, rating, comment, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(property_id, user_id) DO UPDATE SET
                rating = excluded.rating,
                comment = excluded.comment
             RETURNING id, property_id, user_id, rating, comment, created_at",
        )
        .bind(property_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment.trim())
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        let outcome = if existed {
            ReviewOutcome::Updated
        } else {
            ReviewOutcome::Created
        };
        info!(property_id, user_id, ?outcome, "review saved");
        Ok((review, outcome))
    }
}
