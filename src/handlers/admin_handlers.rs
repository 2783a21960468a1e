//! Moderation endpoints. Every handler takes [`AdminUser`], so non-admins get 403.

use crate::{
    errors::AppError,
    handlers::extract::{AdminUser, AppJson, AppPath},
    models::{
        property::{Category, Criterion, Property, PropertyStatus},
        user::User,
    },
    services::admin_service::AdminStats,
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PropertyStatus,
}

pub async fn list_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.admin.categories().await?))
}

pub async fn add_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(payload): AppJson<NameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.admin.add_category(&payload.name).await?;
    info!(admin_id = admin.user_id, category_id = category.id, "category added");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_category(id).await?;
    info!(admin_id = admin.user_id, category_id = id, "category deleted");
    Ok(Json(json!({ "message": "category deleted", "id": id })))
}

pub async fn list_criteria(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Criterion>>, AppError> {
    Ok(Json(state.admin.criteria().await?))
}

pub async fn add_criterion(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(payload): AppJson<NameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let criterion = state.admin.add_criterion(&payload.name).await?;
    info!(admin_id = admin.user_id, criterion_id = criterion.id, "criterion added");
    Ok((StatusCode::CREATED, Json(criterion)))
}

pub async fn delete_criterion(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_criterion(id).await?;
    info!(admin_id = admin.user_id, criterion_id = id, "criterion deleted");
    Ok(Json(json!({ "message": "criterion deleted", "id": id })))
}

/// `GET /admin/stats`
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStats>, AppError> {
    Ok(Json(state.admin.stats().await?))
}

/// `GET /admin/users`: every account except admins.
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.admin.users().await?))
}

/// `PATCH /admin/users/{userId}/status`
pub async fn set_user_active(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<i64>,
    AppJson(payload): AppJson<ActiveRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .admin
        .set_user_active(user_id, payload.is_active)
        .await?;
    info!(
        admin_id = admin.user_id,
        user_id,
        is_active = user.is_active,
        "account status changed"
    );
    Ok(Json(user))
}

/// `PATCH /admin/verify-user/{userId}`
pub async fn verify_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<User>, AppError> {
    let user = state.admin.verify_user(user_id).await?;
    info!(admin_id = admin.user_id, user_id, "account verified");
    Ok(Json(user))
}

/// `PUT /admin/properties/{propertyId}/status`
pub async fn set_property_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(property_id): AppPath<i64>,
    AppJson(payload): AppJson<StatusRequest>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .admin
        .set_property_status(property_id, payload.status)
        .await?;
    info!(admin_id = admin.user_id, property_id, status = ?property.status, "listing moderated");
    Ok(Json(property))
}

/// `GET /admin/properties/pending`
pub async fn pending_properties(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Property>>, AppError> {
    Ok(Json(state.admin.pending_properties().await?))
}
