//! Local persistence for conversations.
//!
//! The whole collection is serialized as one JSON document and overwritten
//! wholesale on every save; there are no partial writes. A missing or
//! corrupt file loads as an empty collection so a damaged store never
//! blocks the chat loop. Disk-write failures are logged and the in-memory
//! copy stays authoritative for the rest of the session.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, error, warn};

use super::conversation::{Conversation, ConversationId, Message};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for conversation store operations.
#[derive(Debug)]
pub struct StoreError(
    /// Human-readable cause.
    pub String,
);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Result type for conversation store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for local conversation storage.
///
/// Implementations own the collection; callers never touch ambient state.
pub trait ConversationStore: Send + Sync {
    /// Load the full collection in persisted order.
    fn load(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>>;

    /// Replace the persisted collection with `conversations`.
    fn save_all(&self, conversations: Vec<Conversation>) -> StoreFuture<'_, StoreResult<()>>;

    /// Append `message` to the conversation `id`, creating the conversation
    /// first when it does not exist yet. Returns the updated conversation.
    fn append_message(
        &self,
        id: ConversationId,
        message: Message,
    ) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Re-key a conversation from `from` to `to`. A missing source or equal
    /// identifiers make this a no-op.
    fn rewrite_id(
        &self,
        from: ConversationId,
        to: ConversationId,
    ) -> StoreFuture<'_, StoreResult<()>>;

    /// Remove a conversation. Returns whether it was present.
    fn remove(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<bool>>;
}

/// JSON-file implementation of [`ConversationStore`].
///
/// New conversations are inserted at the front so the persisted order is
/// most recently started first.
pub struct JsonFileStore {
    path: PathBuf,
    conversations: Mutex<Vec<Conversation>>,
}

impl JsonFileStore {
    /// Open the store at `path`, reading whatever is currently persisted.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let conversations = read_collection(&path);
        debug!(
            path = %path.display(),
            count = conversations.len(),
            "opened conversation store"
        );
        Self {
            path,
            conversations: Mutex::new(conversations),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Vec<Conversation>>> {
        self.conversations
            .lock()
            .map_err(|_| StoreError("conversation store mutex poisoned".to_string()))
    }

    fn persist(&self, conversations: &[Conversation]) {
        if let Err(err) = write_collection(&self.path, conversations) {
            error!(
                path = %self.path.display(),
                %err,
                "failed to persist conversations; keeping in-memory copy"
            );
        }
    }
}

impl ConversationStore for JsonFileStore {
    fn load(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>> {
        Box::pin(async move { Ok(self.lock()?.clone()) })
    }

    fn save_all(&self, conversations: Vec<Conversation>) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut guard = self.lock()?;
            *guard = conversations;
            self.persist(&guard);
            Ok(())
        })
    }

    fn append_message(
        &self,
        id: ConversationId,
        message: Message,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            let mut guard = self.lock()?;
            let updated = if let Some(existing) = guard.iter_mut().find(|c| c.id == id) {
                existing.append(message);
                existing.clone()
            } else {
                let at = message.timestamp.unwrap_or_else(Utc::now);
                let mut fresh = Conversation::new(id, at);
                fresh.append(message);
                guard.insert(0, fresh.clone());
                fresh
            };
            self.persist(&guard);
            Ok(updated)
        })
    }

    fn rewrite_id(
        &self,
        from: ConversationId,
        to: ConversationId,
    ) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            if from == to {
                return Ok(());
            }
            let mut guard = self.lock()?;
            if let Some(existing) = guard.iter_mut().find(|c| c.id == from) {
                existing.id = to;
                self.persist(&guard);
            }
            Ok(())
        })
    }

    fn remove(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let mut guard = self.lock()?;
            let before = guard.len();
            guard.retain(|c| c.id != id);
            let removed = guard.len() != before;
            if removed {
                self.persist(&guard);
            }
            Ok(removed)
        })
    }
}

fn read_collection(path: &Path) -> Vec<Conversation> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(
                path = %path.display(),
                %err,
                "failed to read conversation store, starting empty"
            );
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(conversations) => conversations,
        Err(err) => {
            warn!(
                path = %path.display(),
                %err,
                "conversation store is corrupt, starting empty"
            );
            Vec::new()
        }
    }
}

fn write_collection(path: &Path, conversations: &[Conversation]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_string_pretty(conversations)?;
    std::fs::write(path, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::conversation::UNTITLED;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "solace_store_{tag}_{}.json",
            uuid::Uuid::new_v4().simple()
        ))
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let path = scratch_path("missing");
        let store = JsonFileStore::open(&path);
        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let path = scratch_path("corrupt");
        std::fs::write(&path, "{definitely not json").unwrap();

        let store = JsonFileStore::open(&path);
        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let path = scratch_path("roundtrip");
        let store = JsonFileStore::open(&path);

        let first = ConversationId::generate();
        let second = ConversationId::generate();
        store
            .append_message(first.clone(), Message::user("hello"))
            .await
            .unwrap();
        store
            .append_message(first.clone(), Message::assistant("hi"))
            .await
            .unwrap();
        store
            .append_message(second.clone(), Message::user("another topic"))
            .await
            .unwrap();

        let saved = store.load().await.unwrap();

        let reopened = JsonFileStore::open(&path);
        let reloaded = reopened.load().await.unwrap();
        assert_eq!(reloaded, saved);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded[0].id, second);
        assert_eq!(reloaded[1].id, first);
        assert_eq!(reloaded[1].messages.len(), 2);
        assert_eq!(reloaded[1].messages[0].content, "hello");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_append_creates_conversation_with_title() {
        let path = scratch_path("create");
        let store = JsonFileStore::open(&path);

        let id = ConversationId::generate();
        let conversation = store
            .append_message(id.clone(), Message::user("I feel anxious today"))
            .await
            .unwrap();

        assert_eq!(conversation.id, id);
        assert_eq!(conversation.title, "I feel anxious today");
        assert_eq!(conversation.messages.len(), 1);
        assert!(conversation.messages[0].timestamp.is_some());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_append_to_assistant_only_keeps_placeholder() {
        let path = scratch_path("placeholder");
        let store = JsonFileStore::open(&path);

        let id = ConversationId::generate();
        let conversation = store
            .append_message(id, Message::assistant("welcome"))
            .await
            .unwrap();
        assert_eq!(conversation.title, UNTITLED);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_rewrite_id_rekeys_conversation() {
        let path = scratch_path("rewrite");
        let store = JsonFileStore::open(&path);

        let local = ConversationId::from("local-1");
        let relay = ConversationId::from("relay-9");
        store
            .append_message(local.clone(), Message::user("hello"))
            .await
            .unwrap();

        store
            .rewrite_id(local.clone(), relay.clone())
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, relay);

        // Rewriting a now-absent source changes nothing.
        store.rewrite_id(local, relay.clone()).await.unwrap();
        let again = store.load().await.unwrap();
        assert_eq!(again[0].id, relay);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_remove_reports_presence() {
        let path = scratch_path("remove");
        let store = JsonFileStore::open(&path);

        let id = ConversationId::generate();
        assert!(!store.remove(id.clone()).await.unwrap());

        store
            .append_message(id.clone(), Message::user("bye"))
            .await
            .unwrap();
        assert!(store.remove(id.clone()).await.unwrap());
        assert!(!store.remove(id).await.unwrap());
        assert!(store.load().await.unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }
}
