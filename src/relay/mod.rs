//! Client for the chat relay's HTTP surface.

pub mod api;
pub mod http;

pub use api::{
    ApiFuture, ChatCall, ChatReply, ConversationUpsert, RelayApi, RelayError, RelayResult,
    UpsertMessage, WireMessage,
};
pub use http::HttpRelay;
