use std::sync::Arc;

use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::Artifact;
use crate::errors::{ProviderError, StudioError};
use crate::model::ProviderId;
use crate::provider::{JobBackend, JobHandle, JobSnapshot};
use crate::vendors::{build_client, ensure_success, transport_error};

use super::config::GeminiConfig;

const GEMINI_PROVIDER: &str = "gemini";
const VIDEO_MIME: &str = "video/mp4";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoRequest {
    pub prompt: String,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Veo text-to-video run as a Gemini long-running operation.
#[derive(Clone)]
pub struct GeminiVideos {
    client: reqwest::Client,
    config: Arc<GeminiConfig>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Operation {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    response: Option<OperationResponse>,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRef {
    uri: Option<String>,
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

impl Operation {
    /// A pending operation is reported as running; it already exists remotely.
    pub(crate) fn snapshot(self) -> Result<JobSnapshot, String> {
        if !self.done {
            return Ok(JobSnapshot::running());
        }
        if let Some(error) = self.error {
            return Ok(JobSnapshot::failed(error.message.unwrap_or_default()));
        }
        let video = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video);
        let Some(video) = video else {
            return Ok(JobSnapshot::succeeded(None));
        };
        if let Some(uri) = video.uri.filter(|u| !u.trim().is_empty()) {
            return Ok(JobSnapshot::succeeded(Some(Artifact::Url(uri))));
        }
        match video.bytes_base64_encoded {
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| format!("invalid inline video bytes: {e}"))?;
                Ok(JobSnapshot::succeeded(Some(Artifact::Inline {
                    bytes: Bytes::from(bytes),
                    mime_type: video.mime_type.unwrap_or_else(|| VIDEO_MIME.to_string()),
                })))
            }
            None => Ok(JobSnapshot::succeeded(None)),
        }
    }
}

impl GeminiVideos {
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

    /// Fetches the finished video. Remote URIs require the API key as a
    /// `key` query parameter.
    pub async fn download(&self, artifact: &Artifact) -> Result<(Bytes, String), StudioError> {
        let uri = match artifact {
            Artifact::Inline { bytes, mime_type } => return Ok((bytes.clone(), mime_type.clone())),
            Artifact::Url(uri) => uri,
        };
        let provider_id = self.id();
        let response = self
            .client
            .get(uri)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "video download", e))?;
        let response = ensure_success(&provider_id, "video download", response)
            .await
            .map_err(|e| StudioError::Transport(e.message().to_string()))?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or(VIDEO_MIME)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&provider_id, "video download", e))?;
        debug!(
            event = "video.downloaded",
            domain = "video",
            bytes = bytes.len() as u64
        );
        Ok((bytes, mime_type))
    }
}

#[async_trait::async_trait]
impl JobBackend for GeminiVideos {
    type Request = VideoRequest;

    fn id(&self) -> ProviderId {
        ProviderId::new(GEMINI_PROVIDER)
    }

    async fn submit(&self, request: &VideoRequest) -> Result<JobHandle, ProviderError> {
        let provider_id = self.id();
        let body = PredictRequest {
            instances: [PredictInstance {
                prompt: &request.prompt,
            }],
            parameters: PredictParameters { sample_count: 1 },
        };
        debug!(
            event = "video.submit",
            domain = "video",
            model = %self.config.video_model
        );
        let response = self
            .client
            .post(self.config.predict_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "video generation request", e))?;
        let response = ensure_success(&provider_id, "video generation request", response).await?;
        let operation: Operation = response.json().await.map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid operation: {e}"))
        })?;
        let name = operation
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::provider(
                    provider_id.clone(),
                    "Failed to start video generation.",
                    None,
                )
            })?;
        Ok(JobHandle::new(provider_id, name))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot, ProviderError> {
        let provider_id = self.id();
        let response = self
            .client
            .get(self.config.operation_url(&handle.id))
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "operation status request", e))?;
        let response = ensure_success(&provider_id, "operation status request", response).await?;
        let operation: Operation = response.json().await.map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid operation: {e}"))
        })?;
        operation
            .snapshot()
            .map_err(|message| ProviderError::protocol(provider_id, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JobStatus;

    fn snapshot(json: serde_json::Value) -> JobSnapshot {
        serde_json::from_value::<Operation>(json)
            .expect("operation")
            .snapshot()
            .expect("snapshot")
    }

    #[test]
    fn pending_operation_is_running() {
        assert_eq!(
            snapshot(serde_json::json!({"name": "models/veo/operations/1"})),
            JobSnapshot::running()
        );
    }

    #[test]
    fn finished_operation_yields_video_uri() {
        let snap = snapshot(serde_json::json!({
            "name": "models/veo/operations/1",
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.ai.generativelanguage.v1beta.PredictLongRunningResponse",
                "generateVideoResponse": {
                    "generatedSamples": [{"video": {"uri": "https://files/abc:download?alt=media"}}]
                }
            }
        }));
        assert_eq!(
            snap,
            JobSnapshot::succeeded(Some(Artifact::Url("https://files/abc:download?alt=media".into())))
        );
    }

    #[test]
    fn inline_video_bytes_are_decoded() {
        let snap = snapshot(serde_json::json!({
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [
                {"video": {"bytesBase64Encoded": "AAEC", "mimeType": "video/mp4"}}
            ]}}
        }));
        assert_eq!(
            snap.artifact,
            Some(Artifact::Inline {
                bytes: Bytes::from_static(&[0, 1, 2]),
                mime_type: "video/mp4".into()
            })
        );
    }

    #[test]
    fn done_without_samples_has_no_artifact() {
        let snap = snapshot(serde_json::json!({
            "done": true,
            "response": {"generateVideoResponse": {"raiMediaFilteredCount": 1}}
        }));
        assert_eq!(snap.status, JobStatus::Succeeded);
        assert_eq!(snap.artifact, None);
    }

    #[test]
    fn operation_error_is_a_failure() {
        let snap = snapshot(serde_json::json!({
            "done": true,
            "error": {"code": 3, "message": "Prompt was blocked."}
        }));
        assert_eq!(snap, JobSnapshot::failed("Prompt was blocked."));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            GeminiVideos::new(GeminiConfig::new("")),
            Err(StudioError::Config(_))
        ));
    }
}
