//! src/services/admin_service.rs
//!
//! AdminService: moderation: categories, criteria, user activity and
//! verification, listing approval, and site-wide counters.
//! Callers are checked for the ADMIN role at the HTTP edge.

use crate::{
    models::{
        property::{Category, Criterion, Property, PropertyStatus},
        user::User,
    },
    services::auth_service::is_unique_violation,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const USER_COLUMNS: &str =
    "id, login, email, password_hash, role, is_active, is_verified, created_at";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("name is required")]
    MissingName,
    #[error("`{0}` already exists")]
    Duplicate(String),
    #[error("category {0} not found")]
    CategoryNotFound(i64),
    #[error("category {0} still has listings")]
    CategoryInUse(i64),
    #[error("criterion {0} not found")]
    CriterionNotFound(i64),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("property {0} not found")]
    PropertyNotFound(i64),
    #[error("a listing can only be approved or rejected")]
    InvalidStatus,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AdminResult<T> = Result<T, AdminError>;

#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub name: String,
    pub property_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub user_count: i64,
    pub property_count: i64,
    pub categories: Vec<CategoryStats>,
}

#[derive(Clone)]
pub struct AdminService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl AdminService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    fn clean_name(name: &str) -> AdminResult<&str> {
        let name = name.trim();
        if name.is_empty() {
            Err(AdminError::MissingName)
        } else {
            Ok(name)
        }
    }

    pub async fn add_category(&self, name: &str) -> AdminResult<Category> {
        let name = Self::clean_name(name)?;
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| duplicate_or(err, name))?;
        info!(category_id = category.id, "category added");
        Ok(category)
    }

    pub async fn categories(&self) -> AdminResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Categories referenced by listings cannot be removed.
    pub async fn delete_category(&self, id: i64) -> AdminResult<()> {
        let in_use: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE category_id = ?")
                .bind(id)
                .fetch_one(&*self.db)
                .await?;
        if in_use > 0 {
            return Err(AdminError::CategoryInUse(id));
        }
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AdminError::CategoryNotFound(id));
        }
        info!(category_id = id, "category deleted");
        Ok(())
    }

    pub async fn add_criterion(&self, name: &str) -> AdminResult<Criterion> {
        let name = Self::clean_name(name)?;
        let criterion = sqlx::query_as::<_, Criterion>(
            "INSERT INTO criteria (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| duplicate_or(err, name))?;
        info!(criterion_id = criterion.id, "criterion added");
        Ok(criterion)
    }

    pub async fn criteria(&self) -> AdminResult<Vec<Criterion>> {
        let rows = sqlx::query_as::<_, Criterion>("SELECT id, name FROM criteria ORDER BY name")
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Remove a criterion and detach it from every listing.
    pub async fn delete_criterion(&self, id: i64) -> AdminResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM property_criteria WHERE criterion_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM criteria WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AdminError::CriterionNotFound(id));
        }
        tx.commit().await?;
        info!(criterion_id = id, "criterion deleted");
        Ok(())
    }

    pub async fn stats(&self) -> AdminResult<AdminStats> {
        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&*self.db)
            .await?;
        let property_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties")
            .fetch_one(&*self.db)
            .await?;
        let categories = sqlx::query_as::<_, CategoryStats>(
            "SELECT c.name AS name, COUNT(p.id) AS property_count
             FROM categories c LEFT JOIN properties p ON p.category_id = c.id
             GROUP BY c.id, c.name ORDER BY c.name",
        )
        .fetch_all(&*self.db)
        .await?;

        Ok(AdminStats {
            user_count,
            property_count,
            categories,
        })
    }

    /// Every account except administrators.
    pub async fn users(&self) -> AdminResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role <> 'ADMIN' ORDER BY id"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(users)
    }

    pub async fn set_user_active(&self, user_id: i64, is_active: bool) -> AdminResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(is_active)
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(AdminError::UserNotFound(user_id))?;
        info!(user_id, is_active, "user activity changed");
        Ok(user)
    }

    pub async fn verify_user(&self, user_id: i64) -> AdminResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_verified = 1 WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(AdminError::UserNotFound(user_id))?;
        info!(user_id, "user verified");
        Ok(user)
    }

    /// Approve or reject a listing.
    pub async fn set_property_status(
        &self,
        property_id: i64,
        status: PropertyStatus,
    ) -> AdminResult<Property> {
        if status == PropertyStatus::Pending {
            return Err(AdminError::InvalidStatus);
        }
        let property = sqlx::query_as::<_, Property>(
            "UPDATE properties SET status = ? WHERE id = ?
             RETURNING id, owner_id, category_id, name, description, location,
                       price_per_night, status, created_at",
        )
        .bind(status)
        .bind(property_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(AdminError::PropertyNotFound(property_id))?;
        info!(property_id, status = ?status, "listing moderated");
        Ok(property)
    }

    pub async fn pending_properties(&self) -> AdminResult<Vec<Property>> {
        let rows = sqlx::query_as::<_, Property>(
            "SELECT id, owner_id, category_id, name, description, location,
                    price_per_night, status, created_at
             FROM properties WHERE status = 'PENDING' ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }
}

fn duplicate_or(err: sqlx::Error, name: &str) -> AdminError {
    if is_unique_violation(&err) {
        AdminError::Duplicate(name.to_string())
    } else {
        AdminError::Sqlx(err)
    }
}
