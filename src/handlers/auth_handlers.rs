//! Registration, login and profile edits.

use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AuthUser},
    models::user::User,
    services::auth_service::{ProfileUpdate, Registration},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub message: &'static str,
    pub token: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user: User,
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Registration>,
) -> Result<impl IntoResponse, AppError> {
    let (user, token) = state.auth.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            message: "registered",
            token,
            user,
        }),
    ))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let (user, token) = state.auth.login(&payload.login, &payload.password).await?;
    Ok(Json(TokenResponse {
        message: "logged in",
        token,
        user,
    }))
}

/// `PUT /auth/user/update`
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppJson(payload): AppJson<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.auth.update_profile(&actor, payload).await?;
    Ok(Json(ProfileResponse {
        message: "profile updated",
        user,
    }))
}
