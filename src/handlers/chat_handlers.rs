//! Owner/guest conversations. Clients poll these endpoints.

use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AppPath, AuthUser},
    models::chat::{ChatThread, Message},
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
pub struct CreateChatRequest {
    pub owner_id: i64,
    pub user_id: i64,
    pub property_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub content: String,
}

/// `POST /api/chats`: 201 when created, 200 when the chat already existed.
pub async fn create_chat(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppJson(payload): AppJson<CreateChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (chat, created) = state
        .chats
        .create_chat(
            &actor,
            payload.owner_id,
            payload.user_id,
            payload.property_id,
        )
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(chat)))
}

/// `GET /api/chats/{userId}`
pub async fn user_chats(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<Vec<ChatThread>>, AppError> {
    Ok(Json(state.chats.chats_for_user(&actor, user_id, None).await?))
}

/// `GET /api/chats/{userId}/{propertyId}`
pub async fn user_property_chats(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath((user_id, property_id)): AppPath<(i64, i64)>,
) -> Result<Json<Vec<ChatThread>>, AppError> {
    let threads = state
        .chats
        .chats_for_user(&actor, user_id, Some(property_id))
        .await?;
    Ok(Json(threads))
}

/// `POST /api/messages`. The sender is the caller.
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppJson(payload): AppJson<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = state
        .chats
        .send_message(&actor, payload.chat_id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /api/messages/{chatId}`
pub async fn chat_messages(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    AppPath(chat_id): AppPath<i64>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.chats.messages(&actor, chat_id).await?))
}
