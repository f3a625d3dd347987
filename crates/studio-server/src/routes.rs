use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use futures::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use studio_harness::errors::StudioError;
use studio_harness::vendors::dashscope::ImageRequest;
use studio_harness::vendors::gemini::{ImageAnalysisRequest, VideoRequest};
use studio_harness::{AspectRatio, ChatMessage, ChatProvider as _, ChatRequest, Song};

use crate::state::AppState;

const PROMPT_REQUIRED: &str = "Prompt is required";

/// HTTP status for each error kind.
pub fn status_for(error: &StudioError) -> StatusCode {
    match error {
        StudioError::Validation(_) => StatusCode::BAD_REQUEST,
        StudioError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        StudioError::Submission(_)
        | StudioError::GenerationFailed { .. }
        | StudioError::ArtifactMissing(_)
        | StudioError::Parse(_)
        | StudioError::Transport(_) => StatusCode::BAD_GATEWAY,
        StudioError::Config(_) | StudioError::Cancelled | StudioError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// JSON error body `{ "error": ... }` used by the generation endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Studio(#[from] StudioError),
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Studio(e) => (status_for(e), e.user_message()),
            Self::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message.clone()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::Studio(StudioError::Validation(value.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        warn!(
            event = "http.request_failed",
            domain = "http",
            status = status.as_u16(),
            error = %self
        );
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Plain-text error body used by the chat stream endpoint.
#[derive(Debug)]
pub struct ChatError(StudioError);

impl<E: Into<StudioError>> From<E> for ChatError {
    fn from(value: E) -> Self {
        Self(value.into())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        warn!(
            event = "http.request_failed",
            domain = "http",
            status = status.as_u16(),
            error = %self.0
        );
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.0.user_message(),
        )
            .into_response()
    }
}

fn require_prompt(prompt: Option<String>) -> Result<String, ApiError> {
    prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| StudioError::Validation(PROMPT_REQUIRED.to_string()).into())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub new_message: String,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBody {
    pub prompt: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    #[serde(default)]
    pub prompt: String,
    /// Base64 bytes or a `data:` URL.
    #[serde(default)]
    pub image: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Base64-encoded image bytes.
    pub image: String,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": env!("CARGO_PKG_NAME"),
        "video": state.video_enabled(),
        "vision": state.vision_enabled(),
    }))
}

/// Streams the model reply as plain-text deltas.
pub async fn stream_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ChatError> {
    let Json(body) = payload.map_err(|e| StudioError::Validation(e.body_text()))?;
    let message = body.new_message.trim();
    if message.is_empty() {
        return Err(StudioError::Validation("Message is required".to_string()).into());
    }

    let request = ChatRequest::new(body.history, message)
        .system_instruction(body.system_instruction);
    let request_id = request.request_id;
    info!(
        event = "chat.stream_opened",
        domain = "http",
        request_id = %request_id,
        history_len = request.history.len() as u64
    );
    let deltas = state.dashscope.stream_chat(request).await?;
    let body = deltas.inspect_err(move |e| {
        warn!(
            event = "chat.stream_aborted",
            domain = "http",
            request_id = %request_id,
            error = %e
        );
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageBody>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Json(body) = payload?;
    let prompt = require_prompt(body.prompt)?;
    let request = ImageRequest::new(prompt, body.aspect_ratio);

    let artifact = state.images.run(&request).await?;
    let bytes = state.images.backend().download(&artifact).await?;
    Ok(Json(ImageResponse {
        image: base64::engine::general_purpose::STANDARD.encode(&bytes),
    }))
}

pub async fn generate_music(
    State(state): State<AppState>,
    payload: Result<Json<PromptBody>, JsonRejection>,
) -> Result<Json<Song>, ApiError> {
    let Json(body) = payload?;
    let prompt = require_prompt(body.prompt)?;
    Ok(Json(state.dashscope.generate_song(&prompt).await?))
}

pub async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<PromptBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let videos = state.videos.as_ref().ok_or_else(|| {
        ApiError::Unavailable("Video generation is not configured.".to_string())
    })?;
    let Json(body) = payload?;
    let prompt = require_prompt(body.prompt)?;

    let artifact = videos.run(&VideoRequest::new(prompt)).await?;
    let (bytes, mime_type) = videos.backend().download(&artifact).await?;
    Ok(([(header::CONTENT_TYPE, mime_type)], bytes).into_response())
}

pub async fn analyze_image(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let vision = state.vision.as_ref().ok_or_else(|| {
        ApiError::Unavailable("Image analysis is not configured.".to_string())
    })?;
    let Json(body) = payload?;
    let request = ImageAnalysisRequest::new(body.prompt, &body.image, body.mime_type)?;
    let text = vision.analyze(&request).await?;
    Ok(Json(AnalyzeResponse { text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        assert_eq!(
            status_for(&StudioError::Validation(PROMPT_REQUIRED.into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&StudioError::Timeout {
                attempts: 30,
                message: "Image generation timed out.".into()
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&StudioError::GenerationFailed { message: "x".into() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&StudioError::Config("no key".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn blank_prompt_is_rejected() {
        assert!(require_prompt(Some("  ".into())).is_err());
        assert!(require_prompt(None).is_err());
        assert_eq!(require_prompt(Some(" cat ".into())).expect("prompt"), "cat");
    }

    #[test]
    fn image_body_defaults_aspect_ratio() {
        let body: ImageBody = serde_json::from_str(r#"{"prompt":"cat"}"#).expect("body");
        assert_eq!(body.aspect_ratio, AspectRatio::Square);
        let body: ImageBody =
            serde_json::from_str(r#"{"prompt":"cat","aspectRatio":"9:16"}"#).expect("body");
        assert_eq!(body.aspect_ratio, AspectRatio::Portrait);
    }
}
