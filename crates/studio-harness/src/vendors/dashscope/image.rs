use bytes::Bytes;
use tracing::debug;

use crate::content::Artifact;
use crate::errors::{ProviderError, StudioError};
use crate::model::{AspectRatio, ProviderId};
use crate::provider::{JobBackend, JobHandle, JobSnapshot};
use crate::vendors::{ensure_success, transport_error};

use super::adapter::DashScopeProvider;
use super::wire::{ImageInput, ImageParameters, ImageSynthesisRequest, TaskResponse};

/// Text-to-image request for the async image-synthesis endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio,
        }
    }
}

/// DashScope image synthesis (`wanx-v1`) run as a submit-then-poll job.
#[derive(Clone)]
pub struct DashScopeImages {
    provider: DashScopeProvider,
}

impl DashScopeImages {
    pub fn new(provider: DashScopeProvider) -> Self {
        Self { provider }
    }

    /// Fetches the bytes of a finished artifact.
    pub async fn download(&self, artifact: &Artifact) -> Result<Bytes, StudioError> {
        let url = match artifact {
            Artifact::Inline { bytes, .. } => return Ok(bytes.clone()),
            Artifact::Url(url) => url,
        };
        let provider_id = self.provider.provider_id();
        let response = self
            .provider
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "image download", e))?;
        let response = ensure_success(&provider_id, "image download", response)
            .await
            .map_err(|e| StudioError::Transport(e.message().to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&provider_id, "image download", e))?;
        debug!(
            event = "image.downloaded",
            domain = "image",
            bytes = bytes.len() as u64
        );
        Ok(bytes)
    }
}

pub(crate) fn build_image_body<'a>(model: &'a str, req: &'a ImageRequest) -> ImageSynthesisRequest<'a> {
    ImageSynthesisRequest {
        model,
        input: ImageInput {
            prompt: &req.prompt,
        },
        parameters: ImageParameters {
            size: req.aspect_ratio.provider_size(),
            n: 1,
        },
    }
}

#[async_trait::async_trait]
impl JobBackend for DashScopeImages {
    type Request = ImageRequest;

    fn id(&self) -> ProviderId {
        self.provider.provider_id()
    }

    async fn submit(&self, request: &ImageRequest) -> Result<JobHandle, ProviderError> {
        let provider_id = self.id();
        let config = self.provider.config();
        let body = build_image_body(&config.image_model, request);
        debug!(
            event = "image.submit",
            domain = "image",
            model = %config.image_model,
            size = request.aspect_ratio.provider_size()
        );
        let response = self
            .provider
            .post(config.image_synthesis_url())
            .header("X-DashScope-Async", "enable")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "image synthesis request", e))?;
        let response = ensure_success(&provider_id, "image synthesis request", response).await?;
        let envelope: TaskResponse = response.json().await.map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid submit response: {e}"))
        })?;
        let task_id = envelope
            .output
            .and_then(|o| o.task_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::provider(
                    provider_id.clone(),
                    "Failed to start image generation task.",
                    None,
                )
            })?;
        Ok(JobHandle::new(provider_id, task_id))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot, ProviderError> {
        let provider_id = self.id();
        let response = self
            .provider
            .client
            .get(self.provider.config().task_url(&handle.id))
            .bearer_auth(&self.provider.config().api_key)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "task status request", e))?;
        let response = ensure_success(&provider_id, "task status request", response).await?;
        let envelope: TaskResponse = response.json().await.map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid task response: {e}"))
        })?;
        envelope.snapshot().ok_or_else(|| {
            ProviderError::protocol(provider_id, "task response carried no known status")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_body_uses_mapped_size_and_single_image() {
        let req = ImageRequest::new("a fox in snow", AspectRatio::parse("16:9"));
        let body = serde_json::to_value(build_image_body("wanx-v1", &req)).expect("body");
        assert_eq!(
            body,
            serde_json::json!({
                "model": "wanx-v1",
                "input": {"prompt": "a fox in snow"},
                "parameters": {"size": "1792*1024", "n": 1}
            })
        );
    }

    #[tokio::test]
    async fn inline_artifacts_download_without_network() {
        let images = DashScopeImages::new(
            DashScopeProvider::new(crate::vendors::dashscope::DashScopeConfig::new("k")).expect("provider"),
        );
        let artifact = Artifact::Inline {
            bytes: Bytes::from_static(b"\xff\xd8"),
            mime_type: "image/jpeg".into(),
        };
        assert_eq!(
            images.download(&artifact).await.expect("bytes"),
            Bytes::from_static(b"\xff\xd8")
        );
    }
}
