//! Trust-gated replication of conversations to the relay.
//!
//! - `trust`: endpoint trust classification, resolved once at startup
//! - `identity`: reconciliation of local and relay-assigned conversation ids
//! - `coordinator`: detached push and delete calls with outcome events

pub mod coordinator;
pub mod identity;
pub mod trust;

pub use coordinator::{SyncCoordinator, SyncOp, SyncOutcome, SyncStatus};
pub use identity::{IdentityShift, SyncIdentity};
pub use trust::EndpointTrust;
