//! Conversation data model, local persistence and the turn loop.
//!
//! - `conversation`: roles, messages, identifiers and title derivation
//! - `store`: the [`ConversationStore`] trait and its JSON-file backend
//! - `turn`: the per-turn state machine driving one chat exchange

pub mod conversation;
pub mod store;
pub mod turn;

pub use conversation::{
    Conversation, ConversationId, Message, Role, TITLE_MAX_CHARS, UNTITLED, derive_title,
};
pub use store::{ConversationStore, JsonFileStore, StoreError, StoreFuture, StoreResult};
pub use turn::{FALLBACK_REPLY, RejectReason, TurnController, TurnOutcome, TurnPhase};
