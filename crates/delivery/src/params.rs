//! Boot-time parameter retrieval for ephemeral units.
//!
//! An ephemeral unit starts with nothing but its job id; it fetches its
//! kwargs from a callback URL with bounded exponential backoff. This is
//! the only outbound call in the system with a retry policy; delivery
//! pushes and storage writes are single-attempt with logged failure.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use simgate_core::request::Kwargs;
use simgate_core::types::JobId;

/// Default number of retries after the initial attempt.
pub const DEFAULT_FETCH_RETRIES: u32 = 5;

/// HTTP timeout for a single fetch attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameter retrieval exhausted its retries.
#[derive(Debug, thiserror::Error)]
#[error("Parameter fetch failed after {attempts} attempts: {last_error}")]
pub struct ParamFetchError {
    /// Total attempts made (initial attempt plus retries).
    pub attempts: u32,
    /// Description of the final attempt's failure.
    pub last_error: String,
}

/// Retry an operation with exponential backoff.
///
/// The operation runs immediately; after the `n`-th consecutive failure
/// (zero-based) the caller sleeps `2^n` seconds before trying again, up
/// to `retries` retries. The final error is returned once retries are
/// exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(retries: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= retries => return Err(err),
            Err(err) => {
                let delay = Duration::from_secs(1u64 << attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "Attempt failed, backing off",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// One failed fetch attempt.
#[derive(Debug, thiserror::Error)]
enum FetchAttemptError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Callback returned HTTP {0}")]
    HttpStatus(u16),
}

/// Body shape served by the callback URL.
#[derive(Debug, Deserialize)]
struct InputsResponse {
    inputs: Kwargs,
}

/// Client for the parameter callback URL.
pub struct ParamClient {
    client: reqwest::Client,
    callback_url: String,
    token: String,
    retries: u32,
}

impl ParamClient {
    /// Create a client with the default retry budget.
    pub fn new(callback_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            callback_url: callback_url.into(),
            token: token.into(),
            retries: DEFAULT_FETCH_RETRIES,
        }
    }

    /// Override the retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Fetch the kwargs for a job, retrying with backoff.
    ///
    /// Exhaustion becomes a [`ParamFetchError`], which the runner turns
    /// into the job's terminal `FAIL` envelope.
    pub async fn fetch(&self, job_id: JobId) -> Result<Kwargs, ParamFetchError> {
        retry_with_backoff(self.retries, || self.fetch_once(job_id))
            .await
            .map_err(|err| ParamFetchError {
                attempts: self.retries + 1,
                last_error: err.to_string(),
            })
    }

    async fn fetch_once(&self, job_id: JobId) -> Result<Kwargs, FetchAttemptError> {
        let url = format!("{}/{job_id}", self.callback_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchAttemptError::HttpStatus(response.status().as_u16()));
        }

        let body: InputsResponse = response.json().await?;
        Ok(body.inputs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fifth_attempt_succeeds_after_geometric_waits() {
        let started = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 4 {
                    Err("connection refused")
                } else {
                    Ok(n + 1)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // Four failures back off 1 + 2 + 4 + 8 seconds.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = retry_with_backoff(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("still down") }
        })
        .await;

        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn immediate_success_does_not_sleep() {
        let started = std::time::Instant::now();
        let result: Result<i32, &str> = retry_with_backoff(5, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_maps_exhaustion_to_param_fetch_error() {
        // Nothing listens on this port; every attempt fails fast with a
        // connect error.
        let client = ParamClient::new("http://127.0.0.1:9", "token").with_retries(1);
        let err = client.fetch(JobId::new_v4()).await.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert!(err.last_error.contains("HTTP request failed"));
    }
}
