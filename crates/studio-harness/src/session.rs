use futures::StreamExt as _;
use tracing::{debug, warn};

use crate::content::{ChatMessage, MessageRole};
use crate::errors::StudioError;
use crate::provider::{ChatProvider, ChatRequest};

/// Text shown in place of a model reply that failed mid-flight.
pub const CHAT_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Rolling chat history owned by the caller.
///
/// A session is not shared between requests; each turn borrows it mutably for
/// the duration of the provider stream.
#[derive(Clone, Debug)]
pub struct ChatSession {
    session_id: uuid::Uuid,
    system_instruction: Option<String>,
    history: Vec<ChatMessage>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4(),
            system_instruction: None,
            history: Vec::new(),
        }
    }

    /// Restores a session from previously exchanged messages.
    pub fn with_history(history: Vec<ChatMessage>) -> Self {
        Self {
            history,
            ..Self::new()
        }
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Runs one turn and returns the final model text.
    pub async fn send(
        &mut self,
        provider: &dyn ChatProvider,
        text: &str,
    ) -> Result<String, StudioError> {
        self.send_with(provider, text, |_| {}).await
    }

    /// Runs one turn, reporting the in-progress model message after every
    /// delta.
    ///
    /// On failure the partial reply is replaced by `CHAT_FAILURE_MESSAGE`;
    /// the user's message stays in the history.
    pub async fn send_with<F>(
        &mut self,
        provider: &dyn ChatProvider,
        text: &str,
        mut on_update: F,
    ) -> Result<String, StudioError>
    where
        F: FnMut(&ChatMessage),
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(StudioError::Validation("Message is required".to_string()));
        }

        let request = ChatRequest::new(self.history.clone(), text)
            .system_instruction(self.system_instruction.clone());
        let request_id = request.request_id;
        self.history.push(ChatMessage::user(text));

        let mut reply = ChatMessage::model("");
        reply.is_streaming = true;
        self.history.push(reply);

        match self.stream_reply(provider, request, &mut on_update).await {
            Ok(()) => {
                let Some(reply) = self.history.last_mut() else {
                    return Err(StudioError::Internal("chat history lost its reply".into()));
                };
                reply.is_streaming = false;
                on_update(reply);
                debug!(
                    event = "chat.turn_completed",
                    domain = "chat",
                    session_id = %self.session_id,
                    request_id = %request_id,
                    reply_len = reply.text.len() as u64
                );
                Ok(reply.text.clone())
            }
            Err(e) => {
                warn!(
                    event = "chat.turn_failed",
                    domain = "chat",
                    session_id = %self.session_id,
                    request_id = %request_id,
                    error = %e
                );
                self.history.pop();
                let failure = ChatMessage::new(MessageRole::Model, CHAT_FAILURE_MESSAGE);
                on_update(&failure);
                self.history.push(failure);
                Err(e)
            }
        }
    }

    async fn stream_reply<F>(
        &mut self,
        provider: &dyn ChatProvider,
        request: ChatRequest,
        on_update: &mut F,
    ) -> Result<(), StudioError>
    where
        F: FnMut(&ChatMessage),
    {
        let mut deltas = provider.stream_chat(request).await?;
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            let Some(reply) = self.history.last_mut() else {
                return Err(StudioError::Internal("chat history lost its reply".into()));
            };
            reply.text.push_str(&delta);
            on_update(reply);
        }
        Ok(())
    }
}
