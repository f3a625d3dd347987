use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ProviderError, StudioError};
use crate::model::ProviderId;
use crate::vendors::{build_client, ensure_success, transport_error};

use super::config::GeminiConfig;

const GEMINI_PROVIDER: &str = "gemini";
pub const MISSING_INPUT: &str = "Please provide both an image and a prompt.";

/// A prompt about one inline image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAnalysisRequest {
    pub prompt: String,
    /// Base64 image bytes, without a `data:` URL prefix.
    pub image_base64: String,
    pub mime_type: String,
}

impl ImageAnalysisRequest {
    /// Normalizes and validates caller input. A `data:<mime>;base64,` prefix
    /// is stripped, and its MIME type is used when none is given.
    pub fn new(
        prompt: impl Into<String>,
        image: impl AsRef<str>,
        mime_type: Option<String>,
    ) -> Result<Self, StudioError> {
        let prompt = prompt.into().trim().to_string();
        let image = image.as_ref().trim();
        let (url_mime, data) = match image.strip_prefix("data:").and_then(|r| r.split_once(',')) {
            Some((header, data)) => (header.strip_suffix(";base64").map(str::to_string), data),
            None => (None, image),
        };
        if prompt.is_empty() || data.is_empty() {
            return Err(StudioError::Validation(MISSING_INPUT.into()));
        }
        let mime_type = mime_type
            .filter(|m| !m.trim().is_empty())
            .or(url_mime)
            .unwrap_or_default();
        if !mime_type.starts_with("image/") {
            return Err(StudioError::Validation(format!(
                "Unsupported image type: {mime_type:?}"
            )));
        }
        base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| StudioError::Validation(format!("Image data is not valid base64: {e}")))?;
        Ok(Self {
            prompt,
            image_base64: data.to_string(),
            mime_type,
        })
    }
}

/// Gemini `generateContent` with an inline image part.
#[derive(Clone)]
pub struct GeminiVision {
    client: reqwest::Client,
    config: Arc<GeminiConfig>,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: &'a str,
    },
    Text(&'a str),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, concatenated.
    pub(crate) fn into_text(self) -> Result<String, StudioError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(StudioError::GenerationFailed {
                message: format!("Request was blocked ({reason})."),
            });
        }
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(StudioError::Parse("No content returned from the model.".into()));
        }
        Ok(text)
    }
}

impl GeminiVision {
    pub fn new(config: GeminiConfig) -> Result<Self, StudioError> {
        if config.api_key.trim().is_empty() {
            return Err(StudioError::Config(
                "Gemini config api_key must not be empty".into(),
            ));
        }
        let client = build_client("Gemini", config.timeout)?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Asks the vision model about the image and returns its text answer.
    pub async fn analyze(&self, request: &ImageAnalysisRequest) -> Result<String, StudioError> {
        let provider_id = ProviderId::new(GEMINI_PROVIDER);
        let body = GenerateContentRequest {
            contents: [Content {
                parts: [
                    Part::InlineData {
                        mime_type: &request.mime_type,
                        data: &request.image_base64,
                    },
                    Part::Text(&request.prompt),
                ],
            }],
        };
        debug!(
            event = "vision.request_started",
            domain = "vision",
            model = %self.config.vision_model,
            mime_type = %request.mime_type,
            image_b64_len = request.image_base64.len() as u64
        );
        let response = self
            .client
            .post(self.config.generate_content_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "image analysis request", e))?;
        let response = ensure_success(&provider_id, "image analysis request", response).await?;
        let envelope: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderError::protocol(provider_id, format!("invalid generateContent response: {e}"))
        })?;
        envelope.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped_and_supplies_mime() {
        let req = ImageAnalysisRequest::new(" what is this? ", "data:image/png;base64,AAEC", None)
            .expect("request");
        assert_eq!(req.prompt, "what is this?");
        assert_eq!(req.image_base64, "AAEC");
        assert_eq!(req.mime_type, "image/png");
    }

    #[test]
    fn missing_or_invalid_input_is_rejected() {
        let missing = ImageAnalysisRequest::new("", "AAEC", Some("image/png".into()));
        assert_eq!(missing, Err(StudioError::Validation(MISSING_INPUT.into())));
        assert!(ImageAnalysisRequest::new("describe", "", Some("image/png".into())).is_err());
        assert!(ImageAnalysisRequest::new("describe", "AAEC", Some("text/plain".into())).is_err());
        assert!(ImageAnalysisRequest::new("describe", "not base64!", Some("image/png".into())).is_err());
    }

    #[test]
    fn request_body_puts_image_before_prompt() {
        let body = GenerateContentRequest {
            contents: [Content {
                parts: [
                    Part::InlineData {
                        mime_type: "image/jpeg",
                        data: "AAEC",
                    },
                    Part::Text("describe"),
                ],
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).expect("body"),
            serde_json::json!({"contents": [{"parts": [
                {"inlineData": {"mimeType": "image/jpeg", "data": "AAEC"}},
                {"text": "describe"}
            ]}]})
        );
    }

    #[test]
    fn response_text_parts_are_joined() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "A red "}, {"text": "bicycle."}]}}]
        }))
        .expect("response");
        assert_eq!(response.into_text().expect("text"), "A red bicycle.");
    }

    #[test]
    fn blocked_or_empty_response_is_an_error() {
        let blocked: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .expect("response");
        assert!(matches!(blocked.into_text(), Err(StudioError::GenerationFailed { .. })));
        assert!(matches!(
            GenerateContentResponse::default().into_text(),
            Err(StudioError::Parse(_))
        ));
    }
}
