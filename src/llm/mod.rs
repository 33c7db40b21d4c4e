//! Language model service client.

pub mod upstream;

pub use upstream::{UpstreamClient, UpstreamError, UpstreamMessage};
