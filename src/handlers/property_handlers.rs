//! Catalog and listing pages, plus listing create/edit/delete.
//!
//! Create and edit take `multipart/form-data` so images can ride along with
//! the text fields.

use crate::{
    errors::AppError,
    handlers::{
        extract::{AppPath, AuthUser, MaybeAuthUser},
        forms::{self, ListingForm},
    },
    models::property::{CatalogEntry, PropertyDetails, PropertyWithImages},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// `GET /catalog`
pub async fn catalog(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    Ok(Json(state.properties.catalog(viewer.as_ref()).await?))
}

/// `POST /catalog`
pub async fn create_property(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = ListingForm::read(&state.uploads, multipart).await?;
    let result = match form.new_property() {
        Ok(new) => state
            .properties
            .create(&actor, new, &form.image_urls)
            .await
            .map_err(AppError::from),
        Err(err) => Err(err),
    };
    let details: PropertyDetails =
        forms::discard_on_error(&state.uploads, &form.image_urls, result).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// `DELETE /catalog/{id}`
pub async fn delete_property(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.properties.delete(&actor, id).await?;
    Ok(Json(json!({ "message": "property deleted", "id": id })))
}

/// `GET /property/{id}`
pub async fn property_details(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<PropertyDetails>, AppError> {
    Ok(Json(state.properties.details(id).await?))
}

/// `PUT /property/{id}`
pub async fn update_property(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(id): AppPath<i64>,
    multipart: Multipart,
) -> Result<Json<PropertyWithImages>, AppError> {
    let form = ListingForm::read(&state.uploads, multipart).await?;
    let result = match form.property_update() {
        Ok(update) => state
            .properties
            .update(&actor, id, update, &form.image_urls)
            .await
            .map_err(AppError::from),
        Err(err) => Err(err),
    };
    let updated = forms::discard_on_error(&state.uploads, &form.image_urls, result).await?;
    Ok(Json(updated))
}
