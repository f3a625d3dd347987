use studio_harness::Poller;
use studio_harness::errors::StudioError;
use studio_harness::vendors::dashscope::{DashScopeImages, DashScopeProvider};
use studio_harness::vendors::gemini::{GeminiVideos, GeminiVision};

use crate::config::ServerConfig;

/// Provider clients shared by all handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub dashscope: DashScopeProvider,
    pub images: Poller<DashScopeImages>,
    pub videos: Option<Poller<GeminiVideos>>,
    pub vision: Option<GeminiVision>,
}

impl AppState {
    pub fn from_config(config: ServerConfig) -> Result<Self, StudioError> {
        let dashscope = DashScopeProvider::new(config.dashscope)?;
        let images = Poller::new(DashScopeImages::new(dashscope.clone()), config.image_poll);
        let vision = config.gemini.clone().map(GeminiVision::new).transpose()?;
        let videos = config
            .gemini
            .map(GeminiVideos::new)
            .transpose()?
            .map(|videos| Poller::new(videos, config.video_poll));
        Ok(Self {
            dashscope,
            images,
            videos,
            vision,
        })
    }

    pub fn video_enabled(&self) -> bool {
        self.videos.is_some()
    }

    pub fn vision_enabled(&self) -> bool {
        self.vision.is_some()
    }
}
