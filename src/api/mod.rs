//! Shared plumbing for the remote speech-to-text and summarization services.
//!
//! Both services sit behind narrow traits so the orchestrator (and the tests)
//! never touch HTTP directly; the production implementations live in
//! [`whisper`] and [`chat`].

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

pub mod chat;
pub mod whisper;

pub use chat::ChatSummarizer;
pub use whisper::WhisperClient;

/// Typed failure categories for remote API calls. Transcription and
/// summarization share the taxonomy; the orchestrator reacts per kind.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Invalid or missing credential. Fatal, never retried.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The service signaled throttling. Retryable after a delay.
    #[error("rate limited by the service")]
    RateLimited { retry_after: Option<Duration> },

    /// Transport-level failure before a response arrived. Retryable.
    #[error("connection to the service failed: {0}")]
    ConnectionFailed(String),

    /// The service rejected the request itself. Fatal, never retried.
    #[error("service rejected the request: {0}")]
    InvalidRequest(String),

    /// 5xx-class failure. Retryable.
    #[error("service unavailable (HTTP {status})")]
    ServiceUnavailable { status: u16 },

    /// A success status with a body we could not interpret. Fatal.
    #[error("unexpected response from the service: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    /// Whether another attempt is worth making.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::ConnectionFailed(_)
                | ApiError::ServiceUnavailable { .. }
        )
    }

    /// Map a non-success HTTP status and response body into a failure kind.
    pub fn from_status(status: StatusCode, headers: &HeaderMap, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ApiError::AuthenticationFailed(trim_body(body))
            }
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                retry_after: parse_retry_after(headers),
            },
            s if s.is_server_error() => ApiError::ServiceUnavailable {
                status: s.as_u16(),
            },
            s => ApiError::InvalidRequest(format!("HTTP {}: {}", s.as_u16(), trim_body(body))),
        }
    }

    /// Map a reqwest transport error (DNS, TLS, timeout, refused connection).
    pub fn from_transport(err: reqwest::Error) -> Self {
        ApiError::ConnectionFailed(err.to_string())
    }
}

/// Service-suggested delay from a `Retry-After` header, when parseable.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn trim_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else if trimmed.chars().count() > 512 {
        let head: String = trimmed.chars().take(512).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

/// Narrow seam over the remote speech-to-text service, so tests can substitute
/// a deterministic fake without network access.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one audio segment file, returning the recognized text.
    /// The segment must already satisfy the service's upload size limit;
    /// splitting is the segmenter's job, not the client's.
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<String, ApiError>;
}

/// Narrow seam over the remote summarization model.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense a transcript into a summary written in `target_language`.
    async fn summarize(
        &self,
        transcript_text: &str,
        target_language: &str,
    ) -> Result<String, ApiError>;
}

/// Bounded retry settings for one remote call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    /// Fixed delay between attempts unless the service suggests its own.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Run a remote call with bounded retries. Only retryable kinds (rate limit,
/// connection, 5xx) are attempted again; a service-suggested `Retry-After`
/// delay takes precedence over the fixed backoff. Returns the number of
/// attempts made together with the final result.
pub async fn with_retries<F, Fut, T>(policy: RetryPolicy, mut call: F) -> (u32, Result<T, ApiError>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return (attempt, Ok(value)),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = match &err {
                    ApiError::RateLimited {
                        retry_after: Some(suggested),
                    } => *suggested,
                    _ => policy.backoff,
                };
                tracing::warn!(
                    "attempt {} of {} failed ({}), retrying in {:.1}s",
                    attempt,
                    policy.max_attempts,
                    err,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return (attempt, Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn status_mapping_covers_the_taxonomy() {
        let headers = HeaderMap::new();
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, &headers, String::new()),
            ApiError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, &headers, String::new()),
            ApiError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, &headers, String::new()),
            ApiError::ServiceUnavailable { status: 502 }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, &headers, "bad field".into()),
            ApiError::InvalidRequest(_)
        ));
    }

    #[test]
    fn retry_after_header_is_honored() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        match ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, &headers, String::new()) {
            ApiError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(ApiError::RateLimited { retry_after: None }.is_retryable());
        assert!(ApiError::ConnectionFailed("reset".into()).is_retryable());
        assert!(ApiError::ServiceUnavailable { status: 503 }.is_retryable());
        assert!(!ApiError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!ApiError::InvalidRequest("zero duration".into()).is_retryable());
    }

    #[tokio::test]
    async fn retries_stop_at_the_configured_bound() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };
        let counter = calls.clone();
        let (attempts, result) = with_retries(policy, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(ApiError::RateLimited { retry_after: None })
            }
        })
        .await;

        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ApiError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (attempts, result) = with_retries(RetryPolicy::default(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(ApiError::AuthenticationFailed("bad key".into()))
            }
        })
        .await;

        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ApiError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn a_success_after_a_transient_failure_is_returned() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };
        let counter = calls.clone();
        let (attempts, result) = with_retries(policy, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::ServiceUnavailable { status: 503 })
                } else {
                    Ok("text".to_string())
                }
            }
        })
        .await;

        assert_eq!(attempts, 2);
        assert_eq!(result.unwrap(), "text");
    }
}
