//! HTTP utilities for management API calls

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header::RETRY_AFTER, Client, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::error::{MalformedIdentifier, PollError, RefreshError};

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops non-printable characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A management API call was answered with a non-success status.
#[derive(Debug, Clone, Error)]
#[error("API request failed: {status}")]
pub struct ApiError {
    pub status: StatusCode,
}

/// A response of any status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON body, `Null` when empty or not JSON.
    pub body: Value,
    /// Server-requested delay before polling again.
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// Turn a non-success status into an error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        // Only log the sanitized body, the raw one may carry secrets
        tracing::error!(
            "API error: {} - {}",
            self.status,
            sanitize_for_log(&self.body.to_string())
        );
        Err(ApiError {
            status: self.status,
        }
        .into())
    }
}

/// HTTP client wrapper for management API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("armctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send a request and return the response whatever its status.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        // Error bodies are not always JSON; keep them out of the way
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        tracing::debug!("{} -> {}", status, sanitize_for_log(&text));

        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }

    pub async fn get(&self, url: Url, token: Option<&str>) -> Result<ApiResponse> {
        self.send(Method::GET, url, token, None).await
    }

    pub async fn put(&self, url: Url, token: Option<&str>, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, url, token, Some(body)).await
    }

    pub async fn delete(&self, url: Url, token: Option<&str>) -> Result<ApiResponse> {
        self.send(Method::DELETE, url, token, None).await
    }
}

/// Format an error for display
/// API failures map to short messages by status instead of echoing API
/// details; identifier and wait errors are already readable and print as is.
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(api) = error.chain().find_map(|e| e.downcast_ref::<ApiError>()) {
        return status_message(api.status);
    }

    let error_str = format!("{:#}", error);
    let readable = error.chain().any(|e| {
        e.is::<MalformedIdentifier>() || e.is::<PollError>() || e.is::<RefreshError>()
    });
    if readable {
        return error_str;
    }

    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

fn status_message(status: StatusCode) -> String {
    match status {
        StatusCode::FORBIDDEN => {
            "Permission denied. Check the role assignments of the principal.".to_string()
        }
        StatusCode::UNAUTHORIZED => "Authentication failed. Check the access token.".to_string(),
        StatusCode::NOT_FOUND => "Resource not found.".to_string(),
        StatusCode::TOO_MANY_REQUESTS => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        StatusCode::CONFLICT => {
            "Resource conflict. Another operation may be in progress on this resource."
                .to_string()
        }
        StatusCode::BAD_REQUEST => "Invalid request. Check your parameters.".to_string(),
        s if s.is_server_error() => {
            "Management API temporarily unavailable. Please try again.".to_string()
        }
        s => format!("Request failed ({}). Check your network connection and try again.", s),
    }
}
