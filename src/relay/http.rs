//! HTTP implementation of the relay contract.

use reqwest::Client;
use url::Url;

use super::api::{
    ApiFuture, ChatCall, ChatReply, ConversationUpsert, RelayApi, RelayError, RelayResult,
};
use crate::chat::conversation::ConversationId;

/// Relay client over HTTP.
///
/// Calls carry no client-side deadline. A chat turn can legitimately take
/// as long as the language model behind the relay takes, and replication
/// calls run detached where a hang costs nothing but a pending outcome.
pub struct HttpRelay {
    client: Client,
    base: Url,
}

impl HttpRelay {
    /// Build a client for the relay at `base_url`.
    ///
    /// # Errors
    /// Returns an error when `base_url` is not a valid URL or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str) -> RelayResult<Self> {
        let base = Url::parse(base_url)?;
        let client = Client::builder().build()?;
        Ok(Self { client, base })
    }

    fn chat_url(&self) -> RelayResult<Url> {
        Ok(self.base.join("chat")?)
    }

    fn conversation_url(&self, id: &ConversationId) -> RelayResult<Url> {
        let mut url = self.base.clone();
        // Pushed segments are percent-encoded, so an id carrying `/` or `?`
        // cannot re-target the request.
        url.path_segments_mut()
            .map_err(|()| RelayError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("conversation")
            .push(id.as_str());
        Ok(url)
    }
}

impl RelayApi for HttpRelay {
    fn chat(&self, call: ChatCall) -> ApiFuture<'_, RelayResult<ChatReply>> {
        Box::pin(async move {
            let url = self.chat_url()?;
            let response = self.client.post(url).json(&call).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RelayError::Status(status.as_u16()));
            }
            Ok(response.json::<ChatReply>().await?)
        })
    }

    fn put_conversation(
        &self,
        id: ConversationId,
        upsert: ConversationUpsert,
    ) -> ApiFuture<'_, RelayResult<()>> {
        Box::pin(async move {
            let url = self.conversation_url(&id)?;
            let response = self.client.put(url).json(&upsert).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(RelayError::Status(status.as_u16()))
            }
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> ApiFuture<'_, RelayResult<()>> {
        Box::pin(async move {
            let url = self.conversation_url(&id)?;
            let response = self.client.delete(url).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(RelayError::Status(status.as_u16()))
            }
        })
    }
}
