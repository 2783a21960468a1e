//! Owner/guest conversations about a listing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A conversation, unique per (owner, guest, property).
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    pub owner_id: i64,
    pub user_id: i64,
    pub property_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.owner_id == user_id || self.user_id == user_id
    }
}

#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Chat list entry: the chat, who is in it, the listing, and its messages.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub chat: Chat,
    pub owner_login: String,
    pub user_login: String,
    pub property_name: String,
    #[sqlx(skip)]
    pub messages: Vec<Message>,
}
