//! HTTP edge of the CreativAI studio.
//!
//! Routes:
//! - `POST /api/stream-chat`: chunked `text/plain` deltas of the model reply.
//! - `POST /api/generate-image`: `{ image: <base64> }`.
//! - `POST /api/generate-music`: structured song JSON.
//! - `POST /api/generate-video`: `video/mp4` bytes (503 unless Gemini is configured).
//! - `POST /api/analyze-image`: `{ text }` answer about an inline image (Gemini).
//! - `GET /health`.
pub mod config;
pub mod observability;
pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/stream-chat", post(routes::stream_chat))
        .route("/api/generate-image", post(routes::generate_image))
        .route("/api/generate-music", post(routes::generate_music))
        .route("/api/generate-video", post(routes::generate_video))
        .route("/api/analyze-image", post(routes::analyze_image))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
