use std::time::Duration;

use crate::errors::StudioError;

/// Configuration for the DashScope (Qwen / Wanx) client.
#[derive(Clone, Debug)]
pub struct DashScopeConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the DashScope API.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
    pub chat_model: String,
    pub image_model: String,
}

impl DashScopeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://dashscope.aliyuncs.com".to_string(),
            timeout: Duration::from_secs(120),
            chat_model: "qwen-turbo".to_string(),
            image_model: "wanx-v1".to_string(),
        }
    }

    /// Builds a config from `API_KEY`, falling back to `DASHSCOPE_API_KEY`.
    pub fn from_env() -> Result<Self, StudioError> {
        let api_key = ["API_KEY", "DASHSCOPE_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                StudioError::Config("missing API_KEY for the DashScope provider".into())
            })?;
        Ok(Self::new(api_key))
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StudioError> {
        if self.api_key.trim().is_empty() {
            return Err(StudioError::Config(
                "DashScope config api_key must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub(crate) fn generation_url(&self) -> String {
        format!("{}/api/v1/services/aigc/text-generation/generation", self.root())
    }

    pub(crate) fn image_synthesis_url(&self) -> String {
        format!("{}/api/v1/services/aigc/text2image/image-synthesis", self.root())
    }

    pub(crate) fn task_url(&self, task_id: &str) -> String {
        format!("{}/api/v1/tasks/{task_id}", self.root())
    }
}
