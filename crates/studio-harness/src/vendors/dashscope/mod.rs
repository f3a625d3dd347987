//! DashScope (Alibaba Qwen / Wanx) integration.
//!
//! One `DashScopeProvider` backs three features: streamed chat
//! (`ChatProvider`), song generation (`generate_song`) and async image
//! synthesis (`DashScopeImages`, a `JobBackend`).
mod adapter;
mod config;
mod image;
mod music;
mod wire;

pub use adapter::DashScopeProvider;
pub use config::DashScopeConfig;
pub use image::{DashScopeImages, ImageRequest};
pub use music::song_prompt;
