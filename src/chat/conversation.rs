//! Conversation data model shared by the local store, the turn loop and the
//! synchronization path.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of characters kept when deriving a title.
pub const TITLE_MAX_CHARS: usize = 20;

/// Title used while a conversation has no user message yet.
pub const UNTITLED: &str = "New conversation";

/// Author of a message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The model's reply.
    Assistant,
}

impl Role {
    /// Wire representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque conversation identifier.
///
/// Minted locally when a conversation is first created, or assigned by the
/// relay and adopted during reconciliation. Compared verbatim; no structure
/// is assumed beyond being a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Mint a fresh local identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// View the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One entry in a conversation log.
///
/// Immutable once appended; ordering within a conversation is insertion
/// order. The timestamp is absent only between construction and the append
/// that persists the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the message was appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Build an unstamped user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Build an unstamped assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Return the same message stamped with `at`.
    #[must_use]
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// A titled, ordered sequence of chat messages with a unique identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier, unique within the local collection.
    pub id: ConversationId,
    /// Display title derived from the first user message.
    pub title: String,
    /// Ordered message log. Append-only during a live session.
    pub messages: Vec<Message>,
    /// Refreshed on every append.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation under `id`.
    #[must_use]
    pub fn new(id: ConversationId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: UNTITLED.to_string(),
            messages: Vec::new(),
            updated_at: at,
        }
    }

    /// Append a message, refreshing the title and `updated_at`.
    ///
    /// Unstamped messages are stamped with the current instant so every
    /// persisted message carries a timestamp. `updated_at` only moves
    /// forward; a past-stamped append never rewinds it.
    pub fn append(&mut self, message: Message) {
        let at = message.timestamp.unwrap_or_else(Utc::now);
        self.messages.push(Message {
            timestamp: Some(at),
            ..message
        });
        self.title = derive_title(&self.messages);
        if at > self.updated_at {
            self.updated_at = at;
        }
    }

    /// Messages preceding the most recent one.
    ///
    /// This is the history payload sent alongside a chat turn: the current
    /// message travels separately, so it is excluded here.
    #[must_use]
    pub fn prior_history(&self) -> &[Message] {
        self.messages.split_last().map_or(&[], |(_, rest)| rest)
    }
}

/// Derive a display title from the first user message, if any.
///
/// Content longer than [`TITLE_MAX_CHARS`] characters is cut there and
/// marked with `...`. Character counts, not bytes, so multibyte text is
/// never split mid-glyph.
#[must_use]
pub fn derive_title(messages: &[Message]) -> String {
    let Some(first_user) = messages.iter().find(|m| m.role == Role::User) else {
        return UNTITLED.to_string();
    };
    let trimmed = first_user.content.trim();
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{head}...")
    }
}
