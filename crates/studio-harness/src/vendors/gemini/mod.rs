//! Google Gemini: Veo video generation and image analysis.
mod config;
mod video;
mod vision;

pub use config::GeminiConfig;
pub use video::{GeminiVideos, VideoRequest};
pub use vision::{GeminiVision, ImageAnalysisRequest};
