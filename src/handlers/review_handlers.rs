use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AppPath, AuthUser},
    models::review::ReviewWithAuthor,
    services::review_service::ReviewOutcome,
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub property_id: i64,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// `GET /property/{propertyId}/reviews`
pub async fn property_reviews(
    State(state): State<AppState>,
    AppPath(property_id): AppPath<i64>,
) -> Result<Json<Vec<ReviewWithAuthor>>, AppError> {
    Ok(Json(state.reviews.reviews_for_property(property_id).await?))
}

/// `POST /property/reviews`: 201 for a new review, 200 when it replaced one.
pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (review, outcome) = state
        .reviews
        .add_review(
            payload.property_id,
            actor.user_id,
            payload.rating,
            &payload.comment,
        )
        .await?;
    let status = match outcome {
        ReviewOutcome::Created => StatusCode::CREATED,
        ReviewOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(review)))
}
