//! Vendor integrations.
//!
//! Each vendor module owns its config, wire types and adapters; everything
//! above this layer only sees `ChatProvider`, `JobBackend` and `StudioError`.
pub mod dashscope;
pub mod gemini;

use crate::errors::ProviderError;
use crate::model::ProviderId;

/// Turns a non-2xx response into a `ProviderError::Provider` carrying the
/// status and body text.
pub(crate) async fn ensure_success(
    provider: &ProviderId,
    what: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ProviderError::provider(
        provider.clone(),
        format!("{what} failed with status {status}: {body}"),
        Some(status.as_u16()),
    ))
}

pub(crate) fn transport_error(provider: &ProviderId, what: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::transport(provider.clone(), format!("{what} failed: {err}"))
}

pub(crate) fn build_client(
    vendor: &str,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, crate::errors::StudioError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| crate::errors::StudioError::Config(format!("failed to build {vendor} client: {e}")))
}
