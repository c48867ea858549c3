use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ProviderError;

const MAX_ERROR_BODY: usize = 200;

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        trimmed.to_string()
    } else {
        let mut short: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        short.push_str("...");
        short
    }
}

/// Map a non-success status to a provider error
pub(crate) fn classify_status(status: StatusCode, body: &str, model: &str) -> ProviderError {
    let message = truncate(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(message),
        StatusCode::NOT_FOUND => ProviderError::ModelUnavailable(model.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
        s if s.is_server_error() => ProviderError::Server {
            status: s.as_u16(),
            message,
        },
        s => ProviderError::InvalidResponse(format!("unexpected status {}: {}", s.as_u16(), message)),
    }
}

/// Transport error text without the request URL
fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Http(err.without_url().to_string())
}

/// Send a request and decode a JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    model: &str,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(transport_error)?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(transport_error)?;

    if !status.is_success() {
        debug!("Provider returned {} for model {}", status, model);
        return Err(classify_status(status, &body, model));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Reject blank completions
pub(crate) fn non_empty(text: Option<String>, model: &str) -> Result<String, ProviderError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(ProviderError::InvalidResponse(format!("empty completion from {}", model))),
    }
}
