//! HTTP plumbing shared by every adapter.

use chorus_core::error::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Used when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

pub(crate) fn network_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Network(e.to_string())
}

/// Map a non-success status to the provider error taxonomy.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }
    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "Invalid {provider} API key"
        )));
    }
    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %body, "Backend API error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: body,
        });
    }

    Ok(response)
}

/// Decode a JSON body, reporting schema mismatches as invalid responses.
pub(crate) async fn json_body<T: serde::de::DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    response.json().await.map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse {provider} response: {e}"))
    })
}

/// Ids of every tool call and tool result in `entries`.
///
/// Continuation data keyed by call id is pruned to this set.
pub(crate) fn call_ids(entries: &[chorus_core::ConversationEntry]) -> std::collections::HashSet<&str> {
    use chorus_core::ConversationEntry;
    entries
        .iter()
        .filter_map(|e| match e {
            ConversationEntry::ToolCall(call) => Some(call.id.as_str()),
            ConversationEntry::ToolResult(result) => Some(result.id.as_str()),
            ConversationEntry::Message(_) => None,
        })
        .collect()
}
