//! HTTP utilities for API Gateway REST calls

use crate::error::{ApiError, ApiErrorKind};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header API Gateway uses to carry the error type
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for API Gateway calls
#[derive(Clone)]
pub struct ApiHttpClient {
    client: Client,
}

impl ApiHttpClient {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("apigw-provisioner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Send a request and decode the JSON response
    ///
    /// Empty bodies (e.g. `202 Accepted` on delete) decode to `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let response_body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(rejection(status.as_u16(), &headers, &response_body));
        }

        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&response_body)?)
    }
}

/// Build the typed error for a non-success response
fn rejection(status: u16, headers: &HeaderMap, body: &str) -> ApiError {
    let kind = headers
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(ApiErrorKind::from_error_type)
        .unwrap_or_else(|| ApiErrorKind::from_status(status));

    let retry_after = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| sanitize_for_log(body));

    ApiError::rejected(kind, status, message, retry_after)
}

/// `Retry-After` as delay-seconds; HTTP dates are not used by API Gateway
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Format an API error for the completion reason
/// Security: keeps the provider message but never the raw body
pub fn format_api_error(error: &ApiError) -> String {
    match error {
        ApiError::Rejected { kind, message, .. } => format!("{}: {}", kind, message),
        ApiError::Transport(e) if e.is_timeout() => {
            "Request to API Gateway timed out. Please try again.".to_string()
        }
        ApiError::Transport(e) if e.is_connect() => {
            "Could not connect to API Gateway. Check the endpoint and network.".to_string()
        }
        other => sanitize_for_log(&other.to_string()),
    }
}
