//! Shared HTTP plumbing: client construction, status mapping and 429 retry.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::CollaboratorError;
use crate::rate_limit::RateLimiter;

pub(crate) const USER_AGENT: &str = concat!("patternpress/", env!("CARGO_PKG_VERSION"));

/// Client with a whole-request timeout.
pub(crate) fn build_client(
    service: &'static str,
    timeout: Duration,
) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CollaboratorError::request(service, format!("client build failed: {e}")))
}

/// Map an HTTP error status to a [`CollaboratorError`].
pub(crate) fn map_http_error(
    service: &'static str,
    status: StatusCode,
    body: &str,
) -> CollaboratorError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => CollaboratorError::Auth { service, message },
        429 => CollaboratorError::RateLimited {
            service,
            retry_after: None,
        },
        code => CollaboratorError::Http {
            service,
            status: code,
            message,
        },
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; anything else is returned verbatim.
pub(crate) fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_owned();
    };
    value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
        .map(String::from)
        .unwrap_or_else(|| body.to_owned())
}

/// `Retry-After` in delta-seconds form.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Exponential backoff: 1 s, 2 s, 4 s, ...
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

/// Pass successful responses through; turn the rest into errors.
pub(crate) async fn check_status(
    service: &'static str,
    response: Response,
) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_http_error(service, status, &body))
}

/// Send a request, retrying on HTTP 429 up to `max_retries` times.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by `send`. When a `limiter` is given, every attempt takes a slot from it.
pub(crate) async fn send_with_retry<F>(
    service: &'static str,
    max_retries: u32,
    limiter: Option<&RateLimiter>,
    mut build: F,
) -> Result<Response, CollaboratorError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if let Some(limiter) = limiter {
            limiter.acquire().await;
        }
        let response = build()
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(service, &e))?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return check_status(service, response).await;
        }

        let hinted = retry_after(response.headers());
        if attempt >= max_retries {
            return Err(CollaboratorError::RateLimited {
                service,
                retry_after: hinted,
            });
        }
        let delay = hinted.unwrap_or_else(|| backoff(attempt));
        tracing::warn!(service, attempt, ?delay, "HTTP 429; retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, CollaboratorError> {
    let body = response
        .text()
        .await
        .map_err(|e| CollaboratorError::from_reqwest(service, &e))?;
    serde_json::from_str(&body).map_err(|e| CollaboratorError::decode(service, e.to_string()))
}
