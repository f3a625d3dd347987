use crate::model::ProviderId;

/// Errors returned by a provider adapter before they are normalized into the
/// public `StudioError` taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned an application-level failure (HTTP status, auth, etc.).
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: ProviderId,
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error ({provider}): {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },
    /// Provider response shape was invalid.
    #[error("protocol error ({provider}): {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    /// Creates a provider-level error.
    pub fn provider(
        provider: impl Into<ProviderId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns the provider associated with this error.
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Provider { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => provider,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }

    /// HTTP status reported by the provider, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Provider { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

/// Top-level error type for the public studio API.
///
/// Every variant maps to a distinct user-facing message (`user_message`) so
/// callers never have to surface a generic failure string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StudioError {
    /// Missing or invalid configuration (for example no API key).
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input.
    #[error("validation error: {0}")]
    Validation(String),
    /// The provider rejected the initial request or returned no job handle.
    #[error("submission rejected: {0}")]
    Submission(String),
    /// The provider explicitly reported that generation failed.
    #[error("generation failed: {message}")]
    GenerationFailed { message: String },
    /// The job reached a successful terminal state without a usable artifact.
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),
    /// The poll budget was exhausted before the job reached a terminal state.
    #[error("timed out after {attempts} poll attempts")]
    Timeout { attempts: u32, message: String },
    /// A provider payload did not match the expected schema.
    #[error("parse error: {0}")]
    Parse(String),
    /// Network-level failure talking to the provider.
    #[error("transport error: {0}")]
    Transport(String),
    /// The operation was cancelled before it reached a terminal state.
    #[error("cancelled")]
    Cancelled,
    /// Internal invariant violation (for example a crashed background task).
    #[error("internal error: {0}")]
    Internal(String),
}

impl StudioError {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "API key not configured.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::Submission(message) => format!("Failed to start generation: {message}"),
            Self::GenerationFailed { message } => format!("Generation failed: {message}"),
            Self::ArtifactMissing(message) => message.clone(),
            Self::Timeout { message, .. } => message.clone(),
            Self::Parse(message) => {
                format!("The AI returned an unexpected format: {message}")
            }
            Self::Transport(message) => format!("Could not reach the AI provider: {message}"),
            Self::Cancelled => "Generation was cancelled.".to_string(),
            Self::Internal(_) => "An unknown error occurred".to_string(),
        }
    }
}

impl From<ProviderError> for StudioError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Provider { message, .. } => StudioError::Submission(message),
            ProviderError::Transport { message, .. } => StudioError::Transport(message),
            ProviderError::Protocol { message, .. } => StudioError::Parse(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_onto_distinct_kinds() {
        let rejected = ProviderError::provider("dashscope", "bad key", Some(401));
        assert_eq!(rejected.status_code(), Some(401));
        assert!(matches!(
            StudioError::from(rejected),
            StudioError::Submission(msg) if msg == "bad key"
        ));
        assert!(matches!(
            StudioError::from(ProviderError::transport("dashscope", "reset")),
            StudioError::Transport(_)
        ));
        assert!(matches!(
            StudioError::from(ProviderError::protocol("dashscope", "no task id")),
            StudioError::Parse(_)
        ));
    }

    #[test]
    fn user_messages_keep_provider_text_verbatim() {
        let err = StudioError::GenerationFailed {
            message: "InvalidParameter: prompt blocked".into(),
        };
        assert_eq!(
            err.user_message(),
            "Generation failed: InvalidParameter: prompt blocked"
        );
        assert_eq!(
            StudioError::Timeout {
                attempts: 30,
                message: "Image generation timed out.".into()
            }
            .user_message(),
            "Image generation timed out."
        );
    }
}
