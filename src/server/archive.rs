//! Relay-side conversation archive.
//!
//! One JSON document maps conversation ids to their message log and
//! bookkeeping metadata. The whole document is rewritten after every
//! mutation; a missing or corrupt file loads as an empty archive so the
//! relay always comes up. Roles and timestamps are stored as received,
//! with missing timestamps filled in at archive time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// One archived message. Roles are kept as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
    /// RFC 3339 instant; filled with the current time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Bookkeeping for one archived conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// When the conversation was first archived.
    pub created_at: String,
    /// Refreshed on every mutation.
    pub updated_at: String,
    /// Number of archived messages.
    #[serde(default)]
    pub message_count: usize,
    /// Client-chosen title, present once the conversation was replicated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Default for ArchiveMetadata {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            created_at: now.clone(),
            updated_at: now,
            message_count: 0,
            title: None,
        }
    }
}

/// One archived conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedConversation {
    /// Messages, oldest first.
    pub messages: Vec<ArchivedMessage>,
    /// Bookkeeping metadata.
    #[serde(default)]
    pub metadata: ArchiveMetadata,
}

/// Thread-safe conversation archive backed by a JSON file.
pub struct ConversationArchive {
    path: PathBuf,
    entries: DashMap<String, ArchivedConversation>,
}

impl ConversationArchive {
    /// Open the archive at `path`, reading whatever is currently persisted.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        info!(
            path = %path.display(),
            conversations = entries.len(),
            "opened conversation archive"
        );
        Self { path, entries }
    }

    /// Number of archived conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive holds no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one completed chat turn, creating the conversation on first
    /// contact.
    pub fn record_turn(&self, id: &str, user: &str, assistant: &str) {
        let now = Utc::now().to_rfc3339();
        let mut entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(conversation = %id, "archiving new conversation");
                ArchivedConversation {
                    messages: Vec::new(),
                    metadata: ArchiveMetadata {
                        created_at: now.clone(),
                        updated_at: now.clone(),
                        message_count: 0,
                        title: None,
                    },
                }
            });
        entry.messages.push(ArchivedMessage {
            role: "user".to_string(),
            content: user.to_string(),
            timestamp: Some(now.clone()),
        });
        entry.messages.push(ArchivedMessage {
            role: "assistant".to_string(),
            content: assistant.to_string(),
            timestamp: Some(now.clone()),
        });
        entry.metadata.updated_at = now;
        entry.metadata.message_count = entry.messages.len();
        // The shard lock must be released before persist iterates the map.
        drop(entry);
        self.persist();
    }

    /// Replace a conversation with the client's copy.
    ///
    /// The client is authoritative for content and title; `created_at` is
    /// preserved across replacements and missing message timestamps are
    /// filled with the current time.
    pub fn upsert(&self, id: &str, mut messages: Vec<ArchivedMessage>, title: &str) {
        let now = Utc::now().to_rfc3339();
        for message in &mut messages {
            if message.timestamp.is_none() {
                message.timestamp = Some(now.clone());
            }
        }
        let created_at = self
            .entries
            .get(id)
            .map_or_else(|| now.clone(), |entry| entry.metadata.created_at.clone());
        let message_count = messages.len();
        self.entries.insert(
            id.to_string(),
            ArchivedConversation {
                messages,
                metadata: ArchiveMetadata {
                    created_at,
                    updated_at: now,
                    message_count,
                    title: Some(title.to_string()),
                },
            },
        );
        self.persist();
        info!(conversation = %id, messages = message_count, "conversation synchronized");
    }

    /// Remove a conversation. Returns whether a copy existed.
    pub fn remove(&self, id: &str) -> bool {
        let existed = self.entries.remove(id).is_some();
        if existed {
            self.persist();
            info!(conversation = %id, "conversation removed from archive");
        }
        existed
    }

    /// User messages older than the most recent `exclude_recent` entries,
    /// at most `limit` of them, oldest first.
    ///
    /// These are the topics a long conversation has scrolled past; the
    /// prompt surfaces them so the model keeps its footing.
    #[must_use]
    pub fn recall_user_messages(
        &self,
        id: &str,
        exclude_recent: usize,
        limit: usize,
    ) -> Vec<String> {
        let Some(entry) = self.entries.get(id) else {
            return Vec::new();
        };
        let non_system: Vec<&ArchivedMessage> = entry
            .messages
            .iter()
            .filter(|message| message.role != "system")
            .collect();
        if non_system.len() <= exclude_recent {
            return Vec::new();
        }
        let older = &non_system[..non_system.len() - exclude_recent];
        let mut recalled: Vec<String> = older
            .iter()
            .filter(|message| message.role == "user")
            .rev()
            .take(limit)
            .map(|message| message.content.clone())
            .collect();
        recalled.reverse();
        recalled
    }

    fn persist(&self) {
        let snapshot: BTreeMap<String, ArchivedConversation> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        if let Err(err) = write_entries(&self.path, &snapshot) {
            error!(path = %self.path.display(), %err, "failed to persist archive");
        }
    }
}

fn read_entries(path: &Path) -> DashMap<String, ArchivedConversation> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<BTreeMap<String, ArchivedConversation>>(&raw) {
            Ok(parsed) => parsed.into_iter().collect(),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    %err,
                    "archive file is corrupt, starting empty"
                );
                DashMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => DashMap::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "archive file unreadable, starting empty");
            DashMap::new()
        }
    }
}

fn write_entries(
    path: &Path,
    entries: &BTreeMap<String, ArchivedConversation>,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let serialized = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, serialized)
}
