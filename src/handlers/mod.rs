//! HTTP handlers, grouped by area. Business rules live in `services`.

pub mod admin_handlers;
pub mod auth_handlers;
pub mod booking_handlers;
pub mod chat_handlers;
pub mod extract;
pub mod file_handlers;
pub mod forms;
pub mod health_handlers;
pub mod owner_handlers;
pub mod property_handlers;
pub mod review_handlers;
pub mod user_handlers;
