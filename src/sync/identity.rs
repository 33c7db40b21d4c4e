//! Conversation identity reconciliation.
//!
//! The same logical conversation can carry two identifiers at once: one
//! minted locally, one assigned by the relay. This module models that
//! duality as an explicit state machine with a single transition, so the
//! reconciliation rule is testable without any network involved.

use crate::chat::conversation::ConversationId;

/// Identity of the active conversation as seen by the sync path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIdentity {
    /// No conversation has been started yet.
    Unassigned,
    /// A locally minted id the relay has not acknowledged.
    LocalOnly(ConversationId),
    /// Both sides agree on this id; it is the canonical one.
    Reconciled(ConversationId),
}

/// What [`SyncIdentity::adopt`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityShift {
    /// The incoming id already matched the held one.
    Unchanged,
    /// The incoming id was adopted.
    Adopted {
        /// Id the conversation is still stored under locally when a re-key
        /// is required, absent when nothing was stored yet.
        previous: Option<ConversationId>,
    },
}

impl SyncIdentity {
    /// Identifier to send on a chat call. Only a reconciled id is canonical.
    #[must_use]
    pub const fn canonical(&self) -> Option<&ConversationId> {
        match self {
            Self::Reconciled(id) => Some(id),
            Self::Unassigned | Self::LocalOnly(_) => None,
        }
    }

    /// Identifier the conversation is stored under locally, if any.
    #[must_use]
    pub const fn local(&self) -> Option<&ConversationId> {
        match self {
            Self::Unassigned => None,
            Self::LocalOnly(id) | Self::Reconciled(id) => Some(id),
        }
    }

    /// Adopt an id returned by the relay.
    ///
    /// The only transition of the machine. Adopting the id already held is
    /// reported as [`IdentityShift::Unchanged`], which makes repeated
    /// reconciliation a no-op.
    #[must_use]
    pub fn adopt(self, incoming: ConversationId) -> (Self, IdentityShift) {
        match self {
            Self::Unassigned => (
                Self::Reconciled(incoming),
                IdentityShift::Adopted { previous: None },
            ),
            Self::LocalOnly(held) | Self::Reconciled(held) => {
                if held == incoming {
                    (Self::Reconciled(incoming), IdentityShift::Unchanged)
                } else {
                    (
                        Self::Reconciled(incoming),
                        IdentityShift::Adopted {
                            previous: Some(held),
                        },
                    )
                }
            }
        }
    }
}
