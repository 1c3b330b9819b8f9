//! Shared HTTP plumbing for evaluators that call remote scoring services.

use reqwest::{Response, StatusCode};

use gauge_core::error::EvaluatorError;

/// Map a non-success response onto an [`EvaluatorError`]; pass successes through.
pub(crate) async fn check_response(
    provider: &str,
    response: Response,
) -> Result<Response, EvaluatorError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(EvaluatorError::Auth(format!("Invalid {provider} credentials")));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(EvaluatorError::RateLimited { retry_after_secs });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EvaluatorError::ApiRequest(format!(
            "{provider} API error {status}: {body}"
        )));
    }
    Ok(response)
}

pub(crate) fn request_error(err: reqwest::Error) -> EvaluatorError {
    EvaluatorError::ApiRequest(err.to_string())
}

pub(crate) fn decode_error(err: reqwest::Error) -> EvaluatorError {
    EvaluatorError::InvalidResponse(err.to_string())
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
