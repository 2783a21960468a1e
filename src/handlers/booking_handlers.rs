//! Booking requests, the accept/cancel transitions and per-user booking lists.

use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AppPath, AppQuery, AuthUser, ensure_acts_for},
    models::booking::{Booking, BookingWithProperty, DateRange, PropertyBookings},
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, de};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub property_id: i64,
    #[serde(deserialize_with = "calendar_day")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "calendar_day")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    #[serde(deserialize_with = "calendar_day")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "calendar_day")]
    pub end_date: NaiveDate,
}

#[derive(Serialize)]
pub struct Availability {
    pub available: bool,
    pub nights: i64,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub message: &'static str,
    pub booking: Booking,
}

/// Accepts `2024-06-01` as well as a full RFC 3339 timestamp, keeping the
/// calendar day.
pub(crate) fn calendar_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(day) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.date_naive())
        .map_err(|_| de::Error::custom(format!("invalid date `{}`", raw)))
}

/// `POST /property/booking`. The guest is the caller.
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppJson(payload): AppJson<BookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .bookings
        .create_booking(
            payload.property_id,
            actor.user_id,
            payload.start_date,
            payload.end_date,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// `GET /property/{id}/availability?startDate=..&endDate=..`
pub async fn availability(
    State(state): State<AppState>,
    AppPath(property_id): AppPath<i64>,
    AppQuery(query): AppQuery<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let conflict = state
        .bookings
        .has_conflict(property_id, query.start_date, query.end_date)
        .await?;
    let nights = DateRange::new(query.start_date, query.end_date)
        .map(|range| range.nights())
        .unwrap_or_default();
    Ok(Json(Availability {
        available: !conflict,
        nights,
    }))
}

/// `PUT /property/booking/{bookingId}/accept`
pub async fn accept_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(booking_id): AppPath<i64>,
) -> Result<Json<TransitionResponse>, AppError> {
    let booking = state.bookings.accept(&actor, booking_id).await?;
    Ok(Json(TransitionResponse {
        message: "booking confirmed",
        booking,
    }))
}

/// `PUT /property/booking/{bookingId}/cancel`
pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(booking_id): AppPath<i64>,
) -> Result<Json<TransitionResponse>, AppError> {
    let booking = state.bookings.cancel(&actor, booking_id).await?;
    Ok(Json(TransitionResponse {
        message: "booking cancelled",
        booking,
    }))
}

/// `GET /property/owner/{userId}`: listings with pending requests.
pub async fn owner_pending(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<Vec<PropertyBookings>>, AppError> {
    ensure_acts_for(&actor, user_id)?;
    Ok(Json(state.bookings.owner_pending(user_id).await?))
}

/// `GET /property/user-history/{userId}`
pub async fn user_history(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<Vec<BookingWithProperty>>, AppError> {
    ensure_acts_for(&actor, user_id)?;
    Ok(Json(state.bookings.history(user_id).await?))
}
