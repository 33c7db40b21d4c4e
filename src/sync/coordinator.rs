//! Background replication of conversations to the relay.
//!
//! Replication is strictly best effort: calls run detached from the chat
//! loop, never block it and never roll back a local change. Every
//! operation reports a terminal [`SyncOutcome`] on the channel handed out
//! at construction so the host can log or surface it.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::identity::{IdentityShift, SyncIdentity};
use super::trust::EndpointTrust;
use crate::chat::conversation::{Conversation, ConversationId};
use crate::chat::store::{ConversationStore, StoreResult};
use crate::relay::api::{ConversationUpsert, RelayApi};

/// Replication operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    /// Full-conversation upsert.
    Push,
    /// Remote removal.
    Delete,
}

/// Terminal status of one replication operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The relay acknowledged the call.
    Completed,
    /// The endpoint is untrusted; no call was made.
    Skipped,
    /// The call failed with the recorded error.
    Failed(String),
}

/// Outcome event emitted for every replication operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Which operation ran.
    pub op: SyncOp,
    /// Conversation the operation targeted.
    pub conversation: ConversationId,
    /// How it ended.
    pub status: SyncStatus,
}

/// Client-side replication orchestrator.
///
/// Owns the trust decision, the id reconciliation rule and the detached
/// push/delete calls.
pub struct SyncCoordinator {
    relay: Arc<dyn RelayApi>,
    store: Arc<dyn ConversationStore>,
    trust: EndpointTrust,
    outcomes: UnboundedSender<SyncOutcome>,
}

impl SyncCoordinator {
    /// Create a coordinator and the receiving end of its outcome events.
    #[must_use]
    pub fn new(
        relay: Arc<dyn RelayApi>,
        store: Arc<dyn ConversationStore>,
        trust: EndpointTrust,
    ) -> (Self, UnboundedReceiver<SyncOutcome>) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        (
            Self {
                relay,
                store,
                trust,
                outcomes,
            },
            rx,
        )
    }

    /// Resolved trust level for the configured relay endpoint.
    #[must_use]
    pub const fn trust(&self) -> EndpointTrust {
        self.trust
    }

    /// Apply a relay-assigned id to `identity`, re-keying the local store
    /// when the held id differs. Repeating the call with the same incoming
    /// id changes nothing.
    ///
    /// # Errors
    /// Returns an error when the store re-key fails; `identity` is left
    /// untouched in that case.
    pub async fn reconcile(
        &self,
        identity: &mut SyncIdentity,
        incoming: ConversationId,
    ) -> StoreResult<IdentityShift> {
        let (next, shift) = identity.clone().adopt(incoming);
        if let IdentityShift::Adopted {
            previous: Some(ref previous),
        } = shift
        {
            if let Some(current) = next.local() {
                info!(from = %previous, to = %current, "adopting relay conversation id");
                self.store
                    .rewrite_id(previous.clone(), current.clone())
                    .await?;
            }
        }
        *identity = next;
        Ok(shift)
    }

    /// Replicate a conversation snapshot to the relay.
    ///
    /// Returns immediately; the call runs in the background and reports via
    /// the outcome channel. Untrusted endpoints skip the call entirely.
    pub fn push(&self, snapshot: Conversation) {
        if !self.trust.allows_replication() {
            warn!(
                conversation = %snapshot.id,
                "relay endpoint untrusted, conversation stays local only"
            );
            self.emit(SyncOp::Push, snapshot.id, SyncStatus::Skipped);
            return;
        }

        let relay = Arc::clone(&self.relay);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let id = snapshot.id.clone();
            let upsert = ConversationUpsert::from_conversation(&snapshot);
            let status = match relay.put_conversation(id.clone(), upsert).await {
                Ok(()) => {
                    debug!(conversation = %id, "conversation replicated");
                    SyncStatus::Completed
                }
                Err(err) => {
                    warn!(conversation = %id, %err, "conversation replication failed");
                    SyncStatus::Failed(err.to_string())
                }
            };
            let _ = outcomes.send(SyncOutcome {
                op: SyncOp::Push,
                conversation: id,
                status,
            });
        });
    }

    /// Ask the relay to drop its copy of a conversation.
    ///
    /// The local removal has already happened and is authoritative; a
    /// failure here is reported but never reversed.
    pub fn forget(&self, id: ConversationId) {
        if !self.trust.allows_replication() {
            debug!(conversation = %id, "relay endpoint untrusted, skipping remote delete");
            self.emit(SyncOp::Delete, id, SyncStatus::Skipped);
            return;
        }

        let relay = Arc::clone(&self.relay);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let status = match relay.delete_conversation(id.clone()).await {
                Ok(()) => {
                    debug!(conversation = %id, "remote copy deleted");
                    SyncStatus::Completed
                }
                Err(err) => {
                    warn!(conversation = %id, %err, "remote delete failed, local removal stands");
                    SyncStatus::Failed(err.to_string())
                }
            };
            let _ = outcomes.send(SyncOutcome {
                op: SyncOp::Delete,
                conversation: id,
                status,
            });
        });
    }

    fn emit(&self, op: SyncOp, conversation: ConversationId, status: SyncStatus) {
        let _ = self.outcomes.send(SyncOutcome {
            op,
            conversation,
            status,
        });
    }
}
