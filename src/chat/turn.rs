//! One request/response cycle against the relay.
//!
//! The controller drives the active conversation as a small state machine:
//! idle, awaiting a reply, or recovering from a failed call. Relay failures
//! never escape a turn; the conversation absorbs a fallback reply and the
//! loop keeps going. Only local store failures surface as errors.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::conversation::{Conversation, ConversationId, Message};
use super::store::{ConversationStore, StoreResult};
use crate::relay::api::{ChatCall, ChatReply, RelayApi, WireMessage};
use crate::sync::coordinator::SyncCoordinator;
use crate::sync::identity::SyncIdentity;

/// Reply substituted when the relay call fails.
pub const FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again later.";

/// Phase of the per-turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Ready to send.
    Idle,
    /// A turn is in flight; further sends are rejected.
    AwaitingReply,
    /// The relay call failed; visited while the fallback reply is recorded.
    Failed,
}

/// Why a send was refused without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The message was empty or whitespace only.
    EmptyMessage,
    /// A previous turn is still awaiting its reply.
    TurnInFlight,
}

/// Result of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The relay replied and both messages are recorded.
    Completed {
        /// Conversation after the user and assistant appends.
        conversation: Conversation,
        /// Assistant reply text.
        reply: String,
    },
    /// The relay failed; the fallback reply was recorded instead.
    Recovered {
        /// Conversation including the fallback reply.
        conversation: Conversation,
    },
    /// Nothing was sent or recorded.
    Rejected(RejectReason),
}

/// Drives chat turns for the active conversation.
pub struct TurnController {
    store: Arc<dyn ConversationStore>,
    relay: Arc<dyn RelayApi>,
    sync: SyncCoordinator,
    identity: SyncIdentity,
    phase: TurnPhase,
}

impl TurnController {
    /// Create a controller with no active conversation.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        relay: Arc<dyn RelayApi>,
        sync: SyncCoordinator,
    ) -> Self {
        Self {
            store,
            relay,
            sync,
            identity: SyncIdentity::Unassigned,
            phase: TurnPhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Identity of the active conversation.
    #[must_use]
    pub const fn identity(&self) -> &SyncIdentity {
        &self.identity
    }

    /// Make a stored conversation the active one.
    ///
    /// A persisted id was canonical when it was written, so the
    /// conversation re-enters as reconciled and the id travels on the next
    /// chat call.
    pub fn open(&mut self, id: ConversationId) {
        self.identity = SyncIdentity::Reconciled(id);
        self.phase = TurnPhase::Idle;
    }

    /// Start a fresh conversation.
    pub fn reset(&mut self) {
        self.identity = SyncIdentity::Unassigned;
        self.phase = TurnPhase::Idle;
    }

    /// Send one user turn and wait for the outcome.
    ///
    /// Records the user message, calls the relay with the history preceding
    /// it, records the reply (or [`FALLBACK_REPLY`] when the call fails),
    /// adopts the relay-assigned id and hands the updated snapshot to the
    /// sync coordinator. Runs to completion in every branch.
    ///
    /// # Errors
    /// Returns an error only when a local store operation fails.
    pub async fn send_turn(&mut self, text: &str) -> StoreResult<TurnOutcome> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(TurnOutcome::Rejected(RejectReason::EmptyMessage));
        }
        if !self.try_begin() {
            return Ok(TurnOutcome::Rejected(RejectReason::TurnInFlight));
        }

        let local_id = self.ensure_local_id();

        let user_message = Message::user(trimmed).stamped(Utc::now());
        let conversation = match self.store.append_message(local_id.clone(), user_message).await {
            Ok(conversation) => conversation,
            Err(err) => {
                self.phase = TurnPhase::Idle;
                return Err(err);
            }
        };

        let call = ChatCall {
            message: trimmed.to_string(),
            conversation_history: conversation
                .prior_history()
                .iter()
                .map(WireMessage::from)
                .collect(),
            conversation_id: self.identity.canonical().cloned(),
        };

        match self.relay.chat(call).await {
            Ok(ChatReply {
                response,
                conversation_id,
            }) => {
                if let Err(err) = self.sync.reconcile(&mut self.identity, conversation_id).await {
                    self.phase = TurnPhase::Idle;
                    return Err(err);
                }
                let active_id = self.identity.local().cloned().unwrap_or(local_id);
                let assistant = Message::assistant(response.clone()).stamped(Utc::now());
                let updated = match self.store.append_message(active_id, assistant).await {
                    Ok(updated) => updated,
                    Err(err) => {
                        self.phase = TurnPhase::Idle;
                        return Err(err);
                    }
                };
                self.phase = TurnPhase::Idle;
                self.sync.push(updated.clone());
                Ok(TurnOutcome::Completed {
                    conversation: updated,
                    reply: response,
                })
            }
            Err(err) => {
                warn!(%err, "relay chat call failed, recording fallback reply");
                self.phase = TurnPhase::Failed;
                let fallback = Message::assistant(FALLBACK_REPLY).stamped(Utc::now());
                let updated = match self.store.append_message(local_id, fallback).await {
                    Ok(updated) => updated,
                    Err(store_err) => {
                        self.phase = TurnPhase::Idle;
                        return Err(store_err);
                    }
                };
                self.phase = TurnPhase::Idle;
                self.sync.push(updated.clone());
                Ok(TurnOutcome::Recovered {
                    conversation: updated,
                })
            }
        }
    }

    /// Delete the active conversation locally and, best effort, remotely.
    ///
    /// Local removal is authoritative: a failed or skipped remote delete
    /// never restores the local copy. Returns whether a local copy existed.
    ///
    /// # Errors
    /// Returns an error when the local removal fails.
    pub async fn delete_active(&mut self) -> StoreResult<bool> {
        let Some(id) = self.identity.local().cloned() else {
            return Ok(false);
        };
        let removed = self.store.remove(id.clone()).await?;
        self.sync.forget(id);
        self.identity = SyncIdentity::Unassigned;
        self.phase = TurnPhase::Idle;
        Ok(removed)
    }

    fn try_begin(&mut self) -> bool {
        if self.phase == TurnPhase::Idle {
            self.phase = TurnPhase::AwaitingReply;
            true
        } else {
            false
        }
    }

    /// Id the active conversation is stored under, minting one for a fresh
    /// conversation.
    fn ensure_local_id(&mut self) -> ConversationId {
        if let Some(id) = self.identity.local() {
            return id.clone();
        }
        let minted = ConversationId::generate();
        self.identity = SyncIdentity::LocalOnly(minted.clone());
        minted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::conversation::Role;
    use crate::chat::store::JsonFileStore;
    use crate::relay::api::{ApiFuture, ConversationUpsert, RelayError, RelayResult};
    use crate::sync::coordinator::{SyncOp, SyncOutcome, SyncStatus};
    use crate::sync::trust::EndpointTrust;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct StubRelay {
        reply_id: String,
        chat_fail: AtomicBool,
        delete_fail: AtomicBool,
        calls: Mutex<Vec<ChatCall>>,
        puts: Mutex<Vec<ConversationId>>,
        deletes: Mutex<Vec<ConversationId>>,
    }

    impl StubRelay {
        fn new(reply_id: &str) -> Arc<Self> {
            Arc::new(Self {
                reply_id: reply_id.to_string(),
                chat_fail: AtomicBool::new(false),
                delete_fail: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
                puts: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
            })
        }
    }

    impl RelayApi for StubRelay {
        fn chat(&self, call: ChatCall) -> ApiFuture<'_, RelayResult<ChatReply>> {
            self.calls.lock().unwrap().push(call);
            let fail = self.chat_fail.load(Ordering::SeqCst);
            let reply_id = self.reply_id.clone();
            Box::pin(async move {
                if fail {
                    Err(RelayError::Status(500))
                } else {
                    Ok(ChatReply {
                        response: "I hear you.".to_string(),
                        conversation_id: ConversationId::from(reply_id),
                    })
                }
            })
        }

        fn put_conversation(
            &self,
            id: ConversationId,
            _upsert: ConversationUpsert,
        ) -> ApiFuture<'_, RelayResult<()>> {
            self.puts.lock().unwrap().push(id);
            Box::pin(async { Ok(()) })
        }

        fn delete_conversation(&self, id: ConversationId) -> ApiFuture<'_, RelayResult<()>> {
            self.deletes.lock().unwrap().push(id);
            let fail = self.delete_fail.load(Ordering::SeqCst);
            Box::pin(async move {
                if fail {
                    Err(RelayError::Status(502))
                } else {
                    Ok(())
                }
            })
        }
    }

    struct Fixture {
        controller: TurnController,
        relay: Arc<StubRelay>,
        store: Arc<JsonFileStore>,
        outcomes: UnboundedReceiver<SyncOutcome>,
        path: PathBuf,
    }

    impl Fixture {
        fn new(reply_id: &str, trust: EndpointTrust) -> Self {
            let path = std::env::temp_dir().join(format!(
                "solace-turn-{}.json",
                uuid::Uuid::new_v4().simple()
            ));
            let relay = StubRelay::new(reply_id);
            let store = Arc::new(JsonFileStore::open(path.clone()));
            let (sync, outcomes) = SyncCoordinator::new(relay.clone(), store.clone(), trust);
            let controller = TurnController::new(store.clone(), relay.clone(), sync);
            Self {
                controller,
                relay,
                store,
                outcomes,
                path,
            }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_without_side_effects() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);

        let outcome = fx.controller.send_turn("   ").await.unwrap();

        assert_eq!(outcome, TurnOutcome::Rejected(RejectReason::EmptyMessage));
        assert_eq!(fx.controller.phase(), TurnPhase::Idle);
        assert!(fx.store.load().await.unwrap().is_empty());
        assert!(fx.relay.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_while_awaiting_reply_is_rejected() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);
        assert!(fx.controller.try_begin());

        let outcome = fx.controller.send_turn("hello").await.unwrap();

        assert_eq!(outcome, TurnOutcome::Rejected(RejectReason::TurnInFlight));
        assert!(fx.store.load().await.unwrap().is_empty());
        assert!(fx.relay.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_turn_mints_adopts_and_replicates() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);

        let outcome = fx.controller.send_turn("I feel anxious today").await.unwrap();

        let TurnOutcome::Completed {
            conversation,
            reply,
        } = outcome
        else {
            panic!("expected a completed turn");
        };
        assert_eq!(reply, "I hear you.");
        assert_eq!(conversation.id.as_str(), "relay-1");
        assert_eq!(conversation.title, "I feel anxious today");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.messages[1].role, Role::Assistant);
        assert_eq!(
            fx.controller.identity(),
            &SyncIdentity::Reconciled(ConversationId::from("relay-1"))
        );

        // The first call carries no id and no history.
        let calls = fx.relay.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message, "I feel anxious today");
        assert!(calls[0].conversation_history.is_empty());
        assert!(calls[0].conversation_id.is_none());
        drop(calls);

        // Replication ran against the adopted id.
        let outcome = fx.outcomes.recv().await.unwrap();
        assert_eq!(outcome.op, SyncOp::Push);
        assert_eq!(outcome.status, SyncStatus::Completed);
        assert_eq!(fx.relay.puts.lock().unwrap()[0].as_str(), "relay-1");

        let stored = fx.store.load().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id.as_str(), "relay-1");
    }

    #[tokio::test]
    async fn test_second_turn_sends_prior_history_only() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);
        fx.controller.send_turn("I feel anxious today").await.unwrap();

        fx.controller.send_turn("Tell me more").await.unwrap();

        let calls = fx.relay.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let second = &calls[1];
        assert_eq!(second.message, "Tell me more");
        assert_eq!(
            second.conversation_id,
            Some(ConversationId::from("relay-1"))
        );
        // Prior history stops before the message travelling alongside it.
        assert_eq!(second.conversation_history.len(), 2);
        assert_eq!(second.conversation_history[0].content, "I feel anxious today");
        assert_eq!(second.conversation_history[1].content, "I hear you.");
    }

    #[tokio::test]
    async fn test_relay_failure_records_fallback_reply() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);
        fx.relay.chat_fail.store(true, Ordering::SeqCst);

        let outcome = fx.controller.send_turn("hello").await.unwrap();

        let TurnOutcome::Recovered { conversation } = outcome else {
            panic!("expected a recovered turn");
        };
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[1].role, Role::Assistant);
        assert_eq!(conversation.messages[1].content, FALLBACK_REPLY);
        assert_eq!(fx.controller.phase(), TurnPhase::Idle);
        // No relay id arrived, so the local id is still the only one.
        assert!(fx.controller.identity().canonical().is_none());

        // The failed turn still hands its snapshot to sync.
        let outcome = fx.outcomes.recv().await.unwrap();
        assert_eq!(outcome.op, SyncOp::Push);
        assert_eq!(outcome.status, SyncStatus::Completed);
    }

    #[tokio::test]
    async fn test_conversation_survives_failure_and_recovers() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);
        fx.relay.chat_fail.store(true, Ordering::SeqCst);
        fx.controller.send_turn("first try").await.unwrap();

        fx.relay.chat_fail.store(false, Ordering::SeqCst);
        let outcome = fx.controller.send_turn("second try").await.unwrap();

        let TurnOutcome::Completed { conversation, .. } = outcome else {
            panic!("expected a completed turn");
        };
        // user, fallback, user, assistant
        assert_eq!(conversation.messages.len(), 4);
        assert_eq!(conversation.id.as_str(), "relay-1");

        let calls = fx.relay.calls.lock().unwrap();
        assert_eq!(calls[1].conversation_history.len(), 2);
        assert_eq!(calls[1].conversation_history[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_delete_active_is_locally_authoritative() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);
        fx.controller.send_turn("hello").await.unwrap();
        fx.relay.delete_fail.store(true, Ordering::SeqCst);

        assert!(fx.controller.delete_active().await.unwrap());

        assert!(fx.store.load().await.unwrap().is_empty());
        assert_eq!(fx.controller.identity(), &SyncIdentity::Unassigned);

        let first = fx.outcomes.recv().await.unwrap();
        let second = fx.outcomes.recv().await.unwrap();
        let delete = [first, second]
            .into_iter()
            .find(|o| o.op == SyncOp::Delete)
            .unwrap();
        assert!(matches!(delete.status, SyncStatus::Failed(_)));
        assert_eq!(fx.relay.deletes.lock().unwrap()[0].as_str(), "relay-1");
        // The local store stays empty regardless.
        assert!(fx.store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_active_conversation_is_a_no_op() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);

        assert!(!fx.controller.delete_active().await.unwrap());
        assert!(fx.relay.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untrusted_endpoint_keeps_conversation_local() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Untrusted);

        let outcome = fx.controller.send_turn("hello").await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        let sync_outcome = fx.outcomes.recv().await.unwrap();
        assert_eq!(sync_outcome.status, SyncStatus::Skipped);
        assert!(fx.relay.puts.lock().unwrap().is_empty());
        assert_eq!(fx.store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_sends_resumed_id_on_next_turn() {
        let mut fx = Fixture::new("resumed-7", EndpointTrust::Trusted);
        fx.controller.open(ConversationId::from("resumed-7"));

        fx.controller.send_turn("hi again").await.unwrap();

        let calls = fx.relay.calls.lock().unwrap();
        assert_eq!(
            calls[0].conversation_id,
            Some(ConversationId::from("resumed-7"))
        );
    }

    #[tokio::test]
    async fn test_reset_returns_to_unassigned() {
        let mut fx = Fixture::new("relay-1", EndpointTrust::Trusted);
        fx.controller.send_turn("hello").await.unwrap();

        fx.controller.reset();

        assert_eq!(fx.controller.identity(), &SyncIdentity::Unassigned);
        assert_eq!(fx.controller.phase(), TurnPhase::Idle);
    }
}
