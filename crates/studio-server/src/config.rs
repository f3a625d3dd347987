use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use studio_harness::PollPolicy;
use studio_harness::errors::StudioError;
use studio_harness::vendors::dashscope::DashScopeConfig;
use studio_harness::vendors::gemini::GeminiConfig;

const DEFAULT_VIDEO_ATTEMPTS: u32 = 60;

/// Loads `.env` from the crate directory, then from the working directory.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Reads and parses an environment variable.
///
/// Unset or blank values are `None`; unparsable values are logged and
/// treated as unset.
pub fn get_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok().filter(|v| !v.trim().is_empty())?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!(event = "config.parse_failed", domain = "config", key, "Error parsing {key}");
            None
        }
    }
}

/// Everything the server needs to build its provider clients.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub dashscope: DashScopeConfig,
    /// `None` disables `/api/generate-video` and `/api/analyze-image`.
    pub gemini: Option<GeminiConfig>,
    pub image_poll: PollPolicy,
    pub video_poll: PollPolicy,
}

impl ServerConfig {
    pub fn new(dashscope: DashScopeConfig) -> Self {
        Self {
            dashscope,
            gemini: None,
            image_poll: PollPolicy::image(),
            video_poll: PollPolicy::video(DEFAULT_VIDEO_ATTEMPTS),
        }
    }

    /// Builds the config from the process environment.
    ///
    /// `API_KEY` is required. Optional: `GEMINI_API_KEY`,
    /// `DASHSCOPE_BASE_URL`, `GEMINI_BASE_URL`, `STUDIO_HTTP_TIMEOUT_SECS`,
    /// `STUDIO_VIDEO_MAX_ATTEMPTS`.
    pub fn from_env() -> Result<Self, StudioError> {
        let mut dashscope = DashScopeConfig::from_env()?;
        let mut gemini = GeminiConfig::from_env();
        if let Some(base_url) = get_env::<String>("DASHSCOPE_BASE_URL") {
            dashscope = dashscope.base_url(base_url);
        }
        if let Some(base_url) = get_env::<String>("GEMINI_BASE_URL") {
            gemini = gemini.map(|g| g.base_url(base_url));
        }
        if let Some(secs) = get_env::<u64>("STUDIO_HTTP_TIMEOUT_SECS") {
            dashscope = dashscope.timeout(Duration::from_secs(secs));
            gemini = gemini.map(|g| g.timeout(Duration::from_secs(secs)));
        }
        let video_attempts =
            get_env::<u32>("STUDIO_VIDEO_MAX_ATTEMPTS").unwrap_or(DEFAULT_VIDEO_ATTEMPTS);

        Ok(Self::new(dashscope)
            .gemini(gemini)
            .video_poll(PollPolicy::video(video_attempts)))
    }

    pub fn gemini(mut self, gemini: Option<GeminiConfig>) -> Self {
        self.gemini = gemini;
        self
    }

    pub fn image_poll(mut self, policy: PollPolicy) -> Self {
        self.image_poll = policy;
        self
    }

    pub fn video_poll(mut self, policy: PollPolicy) -> Self {
        self.video_poll = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_budgets() {
        let config = ServerConfig::new(DashScopeConfig::new("k"));
        assert_eq!(config.image_poll.interval, Duration::from_secs(2));
        assert_eq!(config.image_poll.max_attempts, 30);
        assert_eq!(config.video_poll.interval, Duration::from_secs(10));
        assert_eq!(config.video_poll.max_attempts, DEFAULT_VIDEO_ATTEMPTS);
        assert!(config.gemini.is_none());
    }

    #[test]
    fn get_env_ignores_unset_keys() {
        assert_eq!(get_env::<u32>("STUDIO_TEST_SURELY_UNSET_KEY"), None);
    }
}
