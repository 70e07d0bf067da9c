//! Turning provider error responses into [`ProviderError`]s.
//!
//! The match API answers failures with a JSON body carrying `detail`: a
//! plain message, or for rejected requests a list of validation issues.
//! Delta files and catalogs come from static hosting and fail with whatever
//! body the host sends.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;

/// Raw bodies longer than this are cut in error messages.
const MAX_RAW_MESSAGE: usize = 200;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Detail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Issues(Vec<Issue>),
}

#[derive(Debug, Deserialize)]
struct Issue {
    #[serde(default)]
    loc: Vec<Value>,
    msg: String,
}

impl Detail {
    fn into_message(self) -> String {
        match self {
            Self::Message(message) => message,
            Self::Issues(issues) => issues
                .into_iter()
                .map(|issue| {
                    let loc: Vec<String> = issue
                        .loc
                        .iter()
                        .map(|part| match part {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect();
                    if loc.is_empty() {
                        issue.msg
                    } else {
                        format!("{}: {}", loc.join("."), issue.msg)
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Pass a successful response through, map anything else to an error.
///
/// # Errors
///
/// [`ProviderError::RateLimited`] on 429, honoring a numeric `Retry-After`.
/// [`ProviderError::Api`] on any other failure status, with the provider's
/// `detail` as message when the body has one.
pub async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    let body = resp.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    tracing::debug!(status = status.as_u16(), message = %message, "provider request failed");
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.detail.into_message();
    }
    let raw = body.trim();
    if raw.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string();
    }
    match raw.char_indices().nth(MAX_RAW_MESSAGE) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}
