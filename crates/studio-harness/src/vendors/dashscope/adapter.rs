use std::sync::Arc;

use tracing::debug;

use crate::errors::{ProviderError, StudioError};
use crate::model::ProviderId;
use crate::provider::{ChatProvider, ChatRequest, DeltaStream};
use crate::relay::{FramePayload, relay_deltas};
use crate::vendors::{build_client, ensure_success, transport_error};

use super::config::DashScopeConfig;
use super::wire::{
    GenerationInput, GenerationParameters, GenerationRequest, GenerationResponse, WireMessage,
};

pub(crate) const DASHSCOPE_PROVIDER: &str = "dashscope";

/// Shared DashScope HTTP client.
///
/// Cheap to clone; the chat, image and music entry points all borrow the
/// same connection pool.
#[derive(Clone)]
pub struct DashScopeProvider {
    pub(crate) client: reqwest::Client,
    pub(crate) config: Arc<DashScopeConfig>,
}

impl DashScopeProvider {
    pub fn new(config: DashScopeConfig) -> Result<Self, StudioError> {
        config.validate()?;
        let client = build_client("DashScope", config.timeout)?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Creates a provider using `API_KEY`.
    pub fn from_env() -> Result<Self, StudioError> {
        Self::new(DashScopeConfig::from_env()?)
    }

    pub fn config(&self) -> &DashScopeConfig {
        &self.config
    }

    pub(crate) fn provider_id(&self) -> ProviderId {
        ProviderId::new(DASHSCOPE_PROVIDER)
    }

    pub(crate) fn post(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(&self.config.api_key)
    }
}

#[async_trait::async_trait]
impl ChatProvider for DashScopeProvider {
    fn id(&self) -> ProviderId {
        self.provider_id()
    }

    async fn stream_chat(&self, req: ChatRequest) -> Result<DeltaStream, ProviderError> {
        let provider_id = self.provider_id();
        let body = build_chat_body(&self.config.chat_model, &req);
        debug!(
            event = "chat.request_started",
            domain = "chat",
            provider = %provider_id,
            request_id = %req.request_id,
            model = %self.config.chat_model,
            history_len = req.history.len() as u64
        );

        let response = self
            .post(self.config.generation_url())
            .header("X-DashScope-SSE", "enable")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "DashScope chat request", e))?;
        let response = ensure_success(&provider_id, "DashScope chat request", response).await?;

        Ok(Box::pin(relay_deltas(
            provider_id,
            Box::pin(response.bytes_stream()),
            decode_generation_frame,
        )))
    }
}

pub(crate) fn build_chat_body<'a>(model: &'a str, req: &'a ChatRequest) -> GenerationRequest<'a> {
    let mut messages = Vec::with_capacity(req.history.len() + 2);
    if let Some(system) = req.system_instruction.as_deref() {
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
    }
    messages.extend(req.history.iter().filter_map(WireMessage::from_history));
    messages.push(WireMessage {
        role: "user",
        content: &req.new_message,
    });

    GenerationRequest {
        model,
        input: GenerationInput::Messages { messages },
        parameters: GenerationParameters {
            result_format: "text",
            incremental_output: Some(false),
        },
    }
}

/// Extracts the cumulative `output.text` from one stream frame.
pub(crate) fn decode_generation_frame(data: &str) -> Result<FramePayload, serde_json::Error> {
    let frame: GenerationResponse = serde_json::from_str(data)?;
    Ok(match frame.output {
        Some(output) => output
            .text
            .map_or(FramePayload::Ignore, FramePayload::Cumulative),
        None => match (frame.code, frame.message) {
            (Some(code), Some(message)) => FramePayload::Fault(format!("{code}: {message}")),
            (Some(only), None) | (None, Some(only)) => FramePayload::Fault(only),
            (None, None) => FramePayload::Ignore,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ChatMessage;

    #[test]
    fn chat_body_orders_system_history_and_new_message() {
        let req = ChatRequest::new(
            vec![ChatMessage::user("hi"), ChatMessage::model(""), ChatMessage::model("yo")],
            "what's up",
        )
        .system_instruction(Some("You are terse.".into()));
        let body = serde_json::to_value(build_chat_body("qwen-turbo", &req)).expect("body");
        assert_eq!(
            body,
            serde_json::json!({
                "model": "qwen-turbo",
                "input": {"messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "yo"},
                    {"role": "user", "content": "what's up"}
                ]},
                "parameters": {"result_format": "text", "incremental_output": false}
            })
        );
    }

    #[test]
    fn frames_decode_into_payloads() {
        assert_eq!(
            decode_generation_frame(r#"{"output":{"text":"Hel","finish_reason":"null"},"usage":{}}"#)
                .expect("frame"),
            FramePayload::Cumulative("Hel".into())
        );
        assert_eq!(
            decode_generation_frame(r#"{"output":{"finish_reason":"stop"}}"#).expect("frame"),
            FramePayload::Ignore
        );
        assert_eq!(
            decode_generation_frame(r#"{"code":"Throttling","message":"Requests rate limit exceeded"}"#)
                .expect("frame"),
            FramePayload::Fault("Throttling: Requests rate limit exceeded".into())
        );
        assert!(decode_generation_frame("{oops").is_err());
    }

    #[tokio::test]
    async fn env_gated_smoke_stream_chat_if_key_present() {
        if std::env::var("API_KEY").unwrap_or_default().trim().is_empty() {
            eprintln!("skipping DashScope chat smoke test (API_KEY missing)");
            return;
        }
        let provider = DashScopeProvider::from_env().expect("provider");
        let mut session = crate::session::ChatSession::new().system_instruction("Reply with one word.");
        let reply = session.send(&provider, "Say ok").await;
        assert!(reply.is_ok(), "DashScope chat smoke failed: {reply:?}");
    }
}
