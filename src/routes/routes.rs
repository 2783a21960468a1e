//! Defines routes for the marketplace API.
//!
//! ## Structure
//! - **Health**: `/healthz`, `/readyz`
//! - **Auth & users**: `/auth/*`, `/users/{userId}/*`
//! - **Catalog & listings**: `/catalog`, `/property/{id}`
//! - **Bookings & reviews**: `/property/booking/*`, `/property/reviews`
//! - **Chat**: `/api/chats/*`, `/api/messages/*`
//! - **Owner dashboard**: `/stat/*`
//! - **Moderation**: `/admin/*` (ADMIN only)
//! - **Uploaded files**: `/images/{file}`, `/documents/{file}`

use crate::{
    handlers::{
        admin_handlers, auth_handlers, booking_handlers, chat_handlers, file_handlers,
        health_handlers::{healthz, readyz},
        owner_handlers, property_handlers, review_handlers, user_handlers,
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Build the router for every endpoint. Shared state is `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // auth & users
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/user/update", put(auth_handlers::update_profile))
        .route("/users/{user_id}/role", put(user_handlers::update_role))
        .route(
            "/users/{user_id}/verify",
            post(user_handlers::upload_verification),
        )
        .route(
            "/users/{user_id}/verify-status",
            get(user_handlers::verification_status),
        )
        // catalog & listings
        .route(
            "/catalog",
            get(property_handlers::catalog).post(property_handlers::create_property),
        )
        .route("/catalog/{id}", delete(property_handlers::delete_property))
        .route(
            "/property/{id}",
            get(property_handlers::property_details).put(property_handlers::update_property),
        )
        .route("/property/{id}/reviews", get(review_handlers::property_reviews))
        .route(
            "/property/{id}/availability",
            get(booking_handlers::availability),
        )
        .route("/property/reviews", post(review_handlers::add_review))
        // bookings
        .route("/property/booking", post(booking_handlers::create_booking))
        .route(
            "/property/booking/{booking_id}/accept",
            put(booking_handlers::accept_booking),
        )
        .route(
            "/property/booking/{booking_id}/cancel",
            put(booking_handlers::cancel_booking),
        )
        .route(
            "/property/owner/{user_id}",
            get(booking_handlers::owner_pending),
        )
        .route(
            "/property/user-history/{user_id}",
            get(booking_handlers::user_history),
        )
        // chat
        .route("/api/chats", post(chat_handlers::create_chat))
        .route("/api/chats/{user_id}", get(chat_handlers::user_chats))
        .route(
            "/api/chats/{user_id}/{property_id}",
            get(chat_handlers::user_property_chats),
        )
        .route("/api/messages", post(chat_handlers::send_message))
        .route("/api/messages/{chat_id}", get(chat_handlers::chat_messages))
        // owner dashboard
        .route("/stat/statistics/{user_id}", get(owner_handlers::statistics))
        .route("/stat/book-external", post(owner_handlers::book_external))
        // moderation
        .route(
            "/admin/categories",
            get(admin_handlers::list_categories).post(admin_handlers::add_category),
        )
        .route(
            "/admin/categories/{id}",
            delete(admin_handlers::delete_category),
        )
        .route(
            "/admin/criteria",
            get(admin_handlers::list_criteria).post(admin_handlers::add_criterion),
        )
        .route(
            "/admin/criteria/{id}",
            delete(admin_handlers::delete_criterion),
        )
        .route("/admin/stats", get(admin_handlers::stats))
        .route("/admin/users", get(admin_handlers::list_users))
        .route(
            "/admin/users/{user_id}/status",
            patch(admin_handlers::set_user_active),
        )
        .route(
            "/admin/verify-user/{user_id}",
            patch(admin_handlers::verify_user),
        )
        .route(
            "/admin/properties/{id}/status",
            put(admin_handlers::set_property_status),
        )
        .route(
            "/admin/properties/pending",
            get(admin_handlers::pending_properties),
        )
        // uploaded files
        .route("/images/{file}", get(file_handlers::get_image))
        .route("/documents/{file}", get(file_handlers::get_document))
}
