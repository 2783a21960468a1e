//! Fixtures shared by unit tests: an in-memory database carrying the real
//! schema, plus helpers that seed rows directly.

use crate::{
    config::AppConfig,
    db,
    models::{booking::BookingStatus, property::PropertyStatus, user::Principal, user::Role},
    state::AppState,
};
use chrono::{NaiveDate, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::PathBuf, str::FromStr, sync::Arc};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";

/// One pooled connection so every query sees the same in-memory database.
pub async fn memory_db() -> Arc<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

/// A database file behind the production pool settings, so requests really
/// run on separate connections. Pair with [`remove_file_db`].
pub async fn file_db() -> (Arc<SqlitePool>, PathBuf) {
    let path = std::env::temp_dir().join(format!("housing-race-{}.db", Uuid::new_v4()));
    let pool = db::connect(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    (Arc::new(pool), path)
}

pub async fn remove_file_db(pool: Arc<SqlitePool>, path: PathBuf) {
    pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn principal(user_id: i64, role: Role) -> Principal {
    Principal { user_id, role }
}

pub async fn seed_user(db: &SqlitePool, login: &str, role: Role) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (login, email, password_hash, role, is_active, is_verified, created_at)
         VALUES (?, ?, 'not-a-hash', ?, 1, 0, ?) RETURNING id",
    )
    .bind(login)
    .bind(format!("{}@example.com", login))
    .bind(role)
    .bind(Utc::now())
    .fetch_one(db)
    .await
    .unwrap()
}

pub async fn seed_category(db: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO categories (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(db)
        .await
        .unwrap()
}

pub async fn seed_criterion(db: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO criteria (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(db)
        .await
        .unwrap()
}

pub async fn seed_property(
    db: &SqlitePool,
    owner_id: i64,
    category_id: i64,
    status: PropertyStatus,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO properties
            (owner_id, category_id, name, description, location, price_per_night, status, created_at)
         VALUES (?, ?, 'Flat', 'Two rooms', 'Minsk', 50.0, ?, ?) RETURNING id",
    )
    .bind(owner_id)
    .bind(category_id)
    .bind(status)
    .bind(Utc::now())
    .fetch_one(db)
    .await
    .unwrap()
}

pub async fn seed_booking(
    db: &SqlitePool,
    property_id: i64,
    user_id: i64,
    start: &str,
    end: &str,
    status: BookingStatus,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO bookings (property_id, user_id, start_date, end_date, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(property_id)
    .bind(user_id)
    .bind(date(start))
    .bind(date(end))
    .bind(status)
    .bind(Utc::now())
    .fetch_one(db)
    .await
    .unwrap()
}

/// Owner, guest, category and one approved listing.
pub struct Marketplace {
    pub owner: i64,
    pub guest: i64,
    pub category: i64,
    pub property: i64,
}

pub async fn seed_marketplace(db: &SqlitePool) -> Marketplace {
    let owner = seed_user(db, "owner", Role::Owner).await;
    let guest = seed_user(db, "guest", Role::User).await;
    let category = seed_category(db, "Apartment").await;
    let property = seed_property(db, owner, category, PropertyStatus::Approved).await;
    Marketplace {
        owner,
        guest,
        category,
        property,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        upload_dir: std::env::temp_dir().join(format!("housing-test-{}", Uuid::new_v4())),
        jwt_secret: TEST_SECRET.into(),
        token_ttl_hours: 1,
        cors_origin: "http://localhost:3001".into(),
        max_upload_bytes: 1024 * 1024,
    }
}

pub async fn test_state() -> AppState {
    let cfg = test_config();
    std::fs::create_dir_all(&cfg.upload_dir).unwrap();
    let state = AppState::new(memory_db().await, &cfg);
    state.with_test_hash_cost()
}
