//! Common imports for typical harness usage.
pub use crate::{
    AbortHandle, Artifact, AspectRatio, ChatMessage, ChatProvider, ChatSession, JobBackend,
    PollPolicy, Poller, ProviderId, Song, StudioError,
};
