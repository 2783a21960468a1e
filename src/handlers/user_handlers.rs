//! Role changes and identity verification documents.

use crate::{
    errors::AppError,
    handlers::{
        extract::{AppJson, AppPath, AuthUser, ensure_acts_for},
        forms,
    },
    models::user::{Role, User, VerificationDocument, VerificationStatus},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub new_role: Role,
}

#[derive(Serialize)]
pub struct RoleResponse {
    pub message: &'static str,
    pub user: User,
}

/// `PUT /users/{userId}/role`
pub async fn update_role(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(user_id): AppPath<i64>,
    AppJson(payload): AppJson<RoleRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    let user = state
        .users
        .update_role(&actor, user_id, payload.new_role)
        .await?;
    Ok(Json(RoleResponse {
        message: "role updated",
        user,
    }))
}

/// `POST /users/{userId}/verify` (multipart, one or more files)
pub async fn upload_verification(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(user_id): AppPath<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    ensure_acts_for(&actor, user_id)?;
    let urls = forms::read_documents(&state.uploads, multipart).await?;
    let result = state
        .users
        .add_verification_documents(&actor, user_id, &urls)
        .await
        .map_err(AppError::from);
    let documents: Vec<VerificationDocument> =
        forms::discard_on_error(&state.uploads, &urls, result).await?;
    Ok((StatusCode::CREATED, Json(documents)))
}

/// `GET /users/{userId}/verify-status`
pub async fn verification_status(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<VerificationStatus>, AppError> {
    Ok(Json(state.users.verification_status(user_id).await?))
}
