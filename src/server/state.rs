//! Application state shared across all request handlers.

use std::sync::Arc;

use super::archive::ConversationArchive;
use crate::llm::upstream::UpstreamClient;

/// Environment variable overriding the archive file location.
const ARCHIVE_PATH_ENV: &str = "SOLACE_ARCHIVE_PATH";

/// Default archive file.
const DEFAULT_ARCHIVE_PATH: &str = "conversation_archive.json";

/// Shared application state.
pub struct AppState {
    /// Client for the upstream language model service.
    pub upstream: UpstreamClient,
    /// Persisted copy of synchronized conversations.
    pub archive: ConversationArchive,
}

impl AppState {
    /// Create the application state from the environment.
    ///
    /// # Errors
    /// Returns an error if the upstream client cannot be created.
    pub fn from_env() -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let upstream = UpstreamClient::from_env()
            .map_err(|e| format!("Failed to create upstream client: {e}"))?;
        tracing::info!("Upstream endpoint: {}", upstream.base_url());

        let archive_path = std::env::var(ARCHIVE_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_ARCHIVE_PATH.to_string());
        let archive = ConversationArchive::open(archive_path);

        Ok(Arc::new(Self { upstream, archive }))
    }
}
