//! Accounts, roles and the authenticated caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Owner,
    Admin,
}

/// A registered account.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,

    /// Unique login name.
    pub login: String,

    pub email: String,

    /// bcrypt hash; never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    /// Deactivated accounts cannot log in or call authenticated routes.
    pub is_active: bool,

    /// Set by an admin after reviewing verification documents.
    pub is_verified: bool,

    pub created_at: DateTime<Utc>,
}

/// Public view of a user embedded in listings and chats.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct UserSummary {
    pub id: i64,
    pub login: String,
    pub email: String,
}

#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDocument {
    pub id: i64,
    pub user_id: i64,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub is_verified: bool,
    pub documents: Vec<VerificationDocument>,
}

/// The caller behind an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True for the user themself or an admin.
    pub fn acts_for(&self, user_id: i64) -> bool {
        self.user_id == user_id || self.is_admin()
    }
}
