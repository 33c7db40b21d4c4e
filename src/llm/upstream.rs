//! HTTP client for the language model service behind the relay.
//!
//! Behaviour:
//! - `POST /chat` with the assembled prompt and a sampling temperature.
//! - The reply text comes back under `response`; anything else is malformed.
//! - Timeouts and connection failures are distinguished so the relay can map
//!   them to precise status codes.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Default language model service address.
const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000";

/// Environment variable overriding the service address.
const UPSTREAM_URL_ENV: &str = "SOLACE_UPSTREAM_URL";

/// Connection establishment deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whole-request deadline; generation can legitimately take this long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Get the service base URL from the environment or use the default.
fn get_upstream_base_url() -> String {
    std::env::var(UPSTREAM_URL_ENV).unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string())
}

/// Errors produced by upstream generation calls.
#[derive(Debug)]
pub enum UpstreamError {
    /// The call exceeded the request deadline.
    Timeout,
    /// No connection to the service could be established.
    Unreachable,
    /// The service answered with a non-success status.
    HttpStatusNotOk(u16),
    /// The response body carried no reply text.
    MalformedResponse,
    /// Any other HTTP client failure.
    HttpClient(reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_connect() {
            Self::Unreachable
        } else {
            Self::HttpClient(value)
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "language model request timed out"),
            Self::Unreachable => write!(f, "language model service unreachable"),
            Self::HttpStatusNotOk(status) => {
                write!(f, "language model http status not ok: {status}")
            }
            Self::MalformedResponse => write!(f, "language model response malformed"),
            Self::HttpClient(err) => write!(f, "http client error: {err}"),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// One prompt message for the upstream chat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl UpstreamMessage {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    messages: &'a [UpstreamMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Async client for the language model service.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create a client for the address configured in the environment.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, UpstreamError> {
        Self::new(get_upstream_base_url())
    }

    /// Address this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the prompt and return the reply text.
    ///
    /// # Errors
    /// Returns an error if the request fails, times out, the service answers
    /// with a non-success status or the response carries no reply.
    pub async fn generate(
        &self,
        messages: &[UpstreamMessage],
        temperature: f32,
    ) -> Result<String, UpstreamError> {
        let request = GenerateRequest {
            messages,
            temperature,
        };
        let url = format!("{}/chat", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::HttpStatusNotOk(status.as_u16()));
        }

        let payload = response.json::<GenerateResponse>().await?;
        payload.response.ok_or(UpstreamError::MalformedResponse)
    }
}
