use std::time::Duration;

/// Configuration for the Gemini video and vision APIs.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub video_model: String,
    pub vision_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(120),
            video_model: "veo-2.0-generate-001".to_string(),
            vision_model: "gemini-2.5-flash".to_string(),
        }
    }

    /// Reads `GEMINI_API_KEY`. `None` when it is unset or blank; Gemini
    /// features are optional.
    pub fn from_env() -> Option<Self> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub(crate) fn predict_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.root(),
            self.video_model
        )
    }

    pub(crate) fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.root(),
            self.vision_model
        )
    }

    /// `name` is the operation resource name returned by `predict_url`.
    pub(crate) fn operation_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.root(), name.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_never_yields_a_blank_key() {
        if let Some(config) = GeminiConfig::from_env() {
            assert!(!config.api_key.trim().is_empty());
        }
    }

    #[test]
    fn operation_urls_are_rooted_at_v1beta() {
        let config = GeminiConfig::new("k").base_url("http://localhost:8080/");
        assert_eq!(
            config.predict_url(),
            "http://localhost:8080/v1beta/models/veo-2.0-generate-001:predictLongRunning"
        );
        assert_eq!(
            config.operation_url("models/veo-2.0-generate-001/operations/op1"),
            "http://localhost:8080/v1beta/models/veo-2.0-generate-001/operations/op1"
        );
        assert_eq!(
            config.generate_content_url(),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
