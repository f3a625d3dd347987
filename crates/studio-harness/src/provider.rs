use futures::stream::BoxStream;

use crate::content::{Artifact, ChatMessage};
use crate::errors::ProviderError;
use crate::model::ProviderId;

/// Incremental text deltas produced by a streaming chat provider.
pub type DeltaStream = BoxStream<'static, Result<String, ProviderError>>;

/// Normalized chat request passed to a `ChatProvider`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub request_id: uuid::Uuid,
    /// Prior turns, oldest first. Does not include `new_message`.
    pub history: Vec<ChatMessage>,
    pub new_message: String,
    pub system_instruction: Option<String>,
}

impl ChatRequest {
    pub fn new(history: Vec<ChatMessage>, new_message: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4(),
            history,
            new_message: new_message.into(),
            system_instruction: None,
        }
    }

    pub fn system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Provider adapter contract for streamed chat completions.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Opens a provider stream. Errors returned here happen before any delta
    /// was produced; errors inside the stream are terminal.
    async fn stream_chat(&self, req: ChatRequest) -> Result<DeltaStream, ProviderError>;
}

/// Provider-assigned identifier for an asynchronous generation job.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub provider: ProviderId,
    pub id: String,
}

impl JobHandle {
    pub fn new(provider: impl Into<ProviderId>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

/// Lifecycle of a provider job. Ordering follows the lifecycle so a later
/// state always compares greater than an earlier one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Result of one status check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Set when `status` is `Succeeded` and the provider returned output.
    pub artifact: Option<Artifact>,
    /// Provider-supplied failure message when `status` is `Failed`.
    pub message: Option<String>,
}

impl JobSnapshot {
    pub fn pending() -> Self {
        Self::with_status(JobStatus::Pending)
    }

    pub fn running() -> Self {
        Self::with_status(JobStatus::Running)
    }

    pub fn succeeded(artifact: Option<Artifact>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            artifact,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            artifact: None,
            message: Some(message.into()),
        }
    }

    fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            artifact: None,
            message: None,
        }
    }
}

/// Provider adapter contract for submit-then-poll generation jobs.
#[async_trait::async_trait]
pub trait JobBackend: Send + Sync {
    /// Provider-specific job request.
    type Request: Send + Sync;

    fn id(&self) -> ProviderId;

    /// Submits a job and returns its handle.
    async fn submit(&self, request: &Self::Request) -> Result<JobHandle, ProviderError>;

    /// Performs exactly one status check.
    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_orders_by_lifecycle() {
        assert!(JobStatus::Pending < JobStatus::Running);
        assert!(JobStatus::Running < JobStatus::Succeeded);
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn blank_system_instruction_is_dropped() {
        let req = ChatRequest::new(Vec::new(), "hi").system_instruction(Some("  ".into()));
        assert_eq!(req.system_instruction, None);
    }
}
