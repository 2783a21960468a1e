//! Business logic over the shared SQLite pool, one service per area.

pub mod admin_service;
pub mod auth_service;
pub mod booking_service;
pub mod chat_service;
pub mod property_service;
pub mod review_service;
pub mod upload_service;
pub mod user_service;
