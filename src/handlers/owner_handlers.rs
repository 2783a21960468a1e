//! Owner dashboard: statistics and bookings for clients without an account.

use crate::{
    errors::AppError,
    handlers::{
        booking_handlers::calendar_day,
        extract::{AppJson, AppPath, AuthUser, ensure_acts_for},
    },
    models::booking::OwnerStatistics,
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalBookingRequest {
    pub property_id: i64,
    pub client_name: String,
    #[serde(deserialize_with = "calendar_day")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "calendar_day")]
    pub end_date: NaiveDate,
}

/// `GET /stat/statistics/{userId}`
pub async fn statistics(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<OwnerStatistics>, AppError> {
    ensure_acts_for(&actor, user_id)?;
    Ok(Json(state.bookings.owner_statistics(user_id).await?))
}

/// `POST /stat/book-external`: recorded as CONFIRMED straight away.
pub async fn book_external(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppJson(payload): AppJson<ExternalBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .bookings
        .book_external(
            &actor,
            payload.property_id,
            &payload.client_name,
            payload.start_date,
            payload.end_date,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}
