//! Client-side contract with the chat relay.
//!
//! The trait keeps the turn controller and the sync coordinator independent
//! of any concrete transport; tests drive them with in-process stubs.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::conversation::{Conversation, ConversationId, Message, Role};

/// Boxed future returned by relay calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by relay calls.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport-level failure talking to the relay.
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The relay answered with a non-success status.
    #[error("relay returned status {0}")]
    Status(u16),
    /// The configured relay address is not a valid URL.
    #[error("invalid relay url: {0}")]
    Url(#[from] url::ParseError),
}

/// Result alias for relay calls.
pub type RelayResult<T> = Result<T, RelayError>;

/// One history entry on the wire: role and content only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Outbound chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCall {
    /// The current user message.
    pub message: String,
    /// History before the current message; the current message is never
    /// repeated here.
    pub conversation_history: Vec<WireMessage>,
    /// Canonical conversation id, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

/// Relay answer to a chat turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    /// Assistant reply text.
    pub response: String,
    /// Authoritative conversation id, minted by the relay when the call
    /// carried none.
    pub conversation_id: ConversationId,
}

/// One replicated message with its timestamp where known.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertMessage {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Append instant, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Full-conversation snapshot for `PUT /conversation/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationUpsert {
    /// Every message, oldest first.
    pub messages: Vec<UpsertMessage>,
    /// Current display title.
    pub title: String,
    /// Client-side update instant.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ConversationUpsert {
    /// Build the replication payload from a conversation snapshot.
    #[must_use]
    pub fn from_conversation(conversation: &Conversation) -> Self {
        Self {
            messages: conversation
                .messages
                .iter()
                .map(|message| UpsertMessage {
                    role: message.role,
                    content: message.content.clone(),
                    timestamp: message.timestamp,
                })
                .collect(),
            title: conversation.title.clone(),
            updated_at: conversation.updated_at,
        }
    }
}

/// Operations the relay exposes to this client.
pub trait RelayApi: Send + Sync {
    /// Send one chat turn and wait for the reply.
    fn chat(&self, call: ChatCall) -> ApiFuture<'_, RelayResult<ChatReply>>;

    /// Replace the relay's copy of a conversation.
    fn put_conversation(
        &self,
        id: ConversationId,
        upsert: ConversationUpsert,
    ) -> ApiFuture<'_, RelayResult<()>>;

    /// Remove the relay's copy of a conversation.
    fn delete_conversation(&self, id: ConversationId) -> ApiFuture<'_, RelayResult<()>>;
}
