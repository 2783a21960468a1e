//! src/services/chat_service.rs
//!
//! ChatService: conversations between a listing's owner and a guest.
//! Clients poll for new messages; nothing is pushed.

use crate::models::{
    chat::{Chat, ChatThread, Message},
    user::Principal,
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::debug;

const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat {0} not found")]
    NotFound(i64),
    #[error("property {0} not found")]
    PropertyNotFound(i64),
    #[error("the chat owner must own the property")]
    OwnerMismatch,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("message is too long")]
    MessageTooLong,
    #[error("not a participant of chat {0}")]
    NotParticipant(i64),
    #[error("not allowed to read another user's chats")]
    Forbidden,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Clone)]
pub struct ChatService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl ChatService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn get(&self, chat_id: i64) -> ChatResult<Chat> {
        sqlx::query_as::<_, Chat>(
            "SELECT id, owner_id, user_id, property_id, created_at FROM chats WHERE id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ChatError::NotFound(chat_id))
    }

    /// Return the chat for (owner, guest, property), creating it if needed.
    /// The flag is true when a new chat was created.
    pub async fn create_chat(
        &self,
        actor: &Principal,
        owner_id: i64,
        user_id: i64,
        property_id: i64,
    ) -> ChatResult<(Chat, bool)> {
        if !actor.is_admin() && actor.user_id != owner_id && actor.user_id != user_id {
            return Err(ChatError::Forbidden);
        }
        let property_owner: i64 =
            sqlx::query_scalar("SELECT owner_id FROM properties WHERE id = ?")
                .bind(property_id)
                .fetch_optional(&*self.db)
                .await?
                .ok_or(ChatError::PropertyNotFound(property_id))?;
        if property_owner != owner_id {
            return Err(ChatError::OwnerMismatch);
        }

        let inserted = sqlx::query_as::<_, Chat>(
            "INSERT INTO chats (owner_id, user_id, property_id, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(owner_id, user_id, property_id) DO NOTHING
             RETURNING id, owner_id, user_id, property_id, created_at",
        )
        .bind(owner_id)
        .bind(user_id)
        .bind(property_id)
        .bind(Utc::now())
        .fetch_optional(&*self.db)
        .await?;

        if let Some(chat) = inserted {
            debug!(chat_id = chat.id, property_id, "chat created");
            return Ok((chat, true));
        }

        let existing = sqlx::query_as::<_, Chat>(
            "SELECT id, owner_id, user_id, property_id, created_at FROM chats
             WHERE owner_id = ? AND user_id = ? AND property_id = ?",
        )
        .bind(owner_id)
        .bind(user_id)
        .bind(property_id)
        .fetch_one(&*self.db)
        .await?;
        Ok((existing, false))
    }

    /// Chats where `user_id` is owner or guest, optionally for one listing.
    pub async fn chats_for_user(
        &self,
        actor: &Principal,
        user_id: i64,
        property_id: Option<i64>,
    ) -> ChatResult<Vec<ChatThread>> {
        if !actor.acts_for(user_id) {
            return Err(ChatError::Forbidden);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT c.id, c.owner_id, c.user_id, c.property_id, c.created_at,
                    o.login AS owner_login, g.login AS user_login, p.name AS property_name
             FROM chats c
             JOIN users o ON o.id = c.owner_id
             JOIN users g ON g.id = c.user_id
             JOIN properties p ON p.id = c.property_id
             WHERE (c.owner_id = ",
        );
        builder.push_bind(user_id);
        builder.push(" OR c.user_id = ");
        builder.push_bind(user_id);
        builder.push(")");
        if let Some(property_id) = property_id {
            builder.push(" AND c.property_id = ");
            builder.push_bind(property_id);
        }
        builder.push(" ORDER BY c.created_at DESC, c.id DESC");

        let mut threads: Vec<ChatThread> = builder.build_query_as().fetch_all(&*self.db).await?;
        if threads.is_empty() {
            return Ok(threads);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, chat_id, sender_id, content, created_at FROM messages WHERE chat_id IN (",
        );
        let mut separated = builder.separated(", ");
        for thread in &threads {
            separated.push_bind(thread.chat.id);
        }
        separated.push_unseparated(") ORDER BY created_at ASC, id ASC");
        let messages: Vec<Message> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut by_chat: HashMap<i64, Vec<Message>> = HashMap::new();
        for message in messages {
            by_chat.entry(message.chat_id).or_default().push(message);
        }
        for thread in &mut threads {
            thread.messages = by_chat.remove(&thread.chat.id).unwrap_or_default();
        }
        Ok(threads)
    }

    /// Post a message as the caller. Only participants may write.
    pub async fn send_message(
        &self,
        actor: &Principal,
        chat_id: i64,
        content: &str,
    ) -> ChatResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::MessageTooLong);
        }
        let chat = self.get(chat_id).await?;
        if !chat.has_participant(actor.user_id) {
            return Err(ChatError::NotParticipant(chat_id));
        }

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (chat_id, sender_id, content, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, chat_id, sender_id, content, created_at",
        )
        .bind(chat_id)
        .bind(actor.user_id)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        Ok(message)
    }

    /// Messages of a chat, oldest first.
    pub async fn messages(&self, actor: &Principal, chat_id: i64) -> ChatResult<Vec<Message>> {
        let chat = self.get(chat_id).await?;
        if !chat.has_participant(actor.user_id) && !actor.is_admin() {
            return Err(ChatError::NotParticipant(chat_id));
        }
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, chat_id, sender_id, content, created_at FROM messages
             WHERE chat_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(chat_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(messages)
    }
}
