use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A guest's rating of a listing. One per (property, user).
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub property_id: i64,
    pub user_id: i64,
    /// 1 to 5.
    pub rating: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Review plus the reviewer's login for display.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub author_login: String,
}
