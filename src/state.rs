//! Shared application state handed to every handler.

use crate::{
    config::AppConfig,
    services::{
        admin_service::AdminService, auth_service::AuthService, booking_service::BookingService,
        chat_service::ChatService, property_service::PropertyService,
        review_service::ReviewService, upload_service::UploadService, user_service::UserService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Every service shares one SQLite pool; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub auth: AuthService,
    pub users: UserService,
    pub properties: PropertyService,
    pub bookings: BookingService,
    pub reviews: ReviewService,
    pub chats: ChatService,
    pub admin: AdminService,
    pub uploads: UploadService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig) -> Self {
        let uploads = UploadService::new(cfg.upload_dir.clone());
        Self {
            auth: AuthService::new(db.clone(), &cfg.jwt_secret, cfg.token_ttl_hours),
            users: UserService::new(db.clone()),
            properties: PropertyService::new(db.clone(), uploads.clone()),
            bookings: BookingService::new(db.clone()),
            reviews: ReviewService::new(db.clone()),
            chats: ChatService::new(db.clone()),
            admin: AdminService::new(db.clone()),
            uploads,
            db,
        }
    }

    #[cfg(test)]
    pub fn with_test_hash_cost(mut self) -> Self {
        self.auth = self.auth.with_min_hash_cost();
        self
    }
}
