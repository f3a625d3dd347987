//! Provider-facing core of the CreativAI studio gateway.
//!
//! The crate exposes two engines and the adapters that feed them:
//!
//! - [`relay`] re-chunks a cumulative-text SSE stream into incremental deltas.
//! - [`job`] drives submit-then-poll generation jobs to a terminal outcome.
//!
//! Vendor-specific APIs are namespaced under `vendors::*`.
//!
//! # Streaming a chat turn (DashScope)
//!
//! ```no_run
//! use studio_harness::prelude::*;
//! use studio_harness::vendors::dashscope::DashScopeProvider;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StudioError> {
//! let provider = DashScopeProvider::from_env()?;
//! let mut session = ChatSession::new().system_instruction("Answer briefly.");
//!
//! let reply = session
//!     .send_with(&provider, "Say hello", |msg| eprint!("\r{}", msg.text))
//!     .await?;
//! println!("\n{reply}");
//! # Ok(())
//! # }
//! ```

/// Chat messages, songs and generation artifacts.
pub mod content;
/// Adapter-level and public error types.
pub mod errors;
/// Long-running job poller and cancellation handles.
pub mod job;
/// Provider identifiers and aspect ratios.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Provider adapter contracts used by vendor integrations.
pub mod provider;
/// Cumulative-text to delta stream relay.
pub mod relay;
/// Caller-owned chat history and turn orchestration.
pub mod session;
/// Byte-level SSE frame decoder.
pub mod sse;
/// Vendor-specific integrations.
pub mod vendors;

pub use content::{Artifact, ChatMessage, LyricSection, MessageRole, Song};
pub use errors::{ProviderError, StudioError};
pub use job::{AbortHandle, AbortSignal, Job, PollPolicy, PollTask, Poller, abort_pair};
pub use model::{AspectRatio, ProviderId};
pub use provider::{
    ChatProvider, ChatRequest, DeltaStream, JobBackend, JobHandle, JobSnapshot, JobStatus,
};
pub use relay::{FramePayload, relay_deltas};
pub use session::{CHAT_FAILURE_MESSAGE, ChatSession};
