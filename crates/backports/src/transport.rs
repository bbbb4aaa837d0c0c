//! HTTP transport with rate-limit aware retries.
//!
//! [`RetryingTransport`] decorates any [`Transport`] and retries requests the
//! server answered with `429 Too Many Requests`. The wait before each retry
//! honours a numeric `Retry-After` header when present and falls back to an
//! exponential backoff otherwise. Every attempt sends a fresh clone of the
//! original request, so a body consumed by an earlier attempt is never
//! replayed half-read.
//!
//! Only 429 triggers a retry. Connection failures are returned immediately,
//! and any other status (including 5xx) is handed back to the caller as a
//! normal response. When the retry budget runs out, the last 429 response is
//! returned as-is.
//!
//! All waiting is bound to a [`CancellationToken`]: cancelling it aborts a
//! pending request, a backoff wait or a body read with
//! [`TransportError::Cancelled`].

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Request, Response, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay before the first exponential-backoff retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default longest pause between two reads of a response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A single outbound HTTP request attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the server's response.
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;

    /// Read the whole body of a response returned by [`Transport::execute`].
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, TransportError> {
        Ok(response.bytes().await?.into())
    }
}

/// The plain transport backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Wrap an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        Ok(self.client.execute(request).await?)
    }
}

/// Retry limits for [`RetryingTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// First exponential-backoff delay; doubles after each use
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

/// Decorator that retries rate-limited requests.
#[derive(Debug, Clone)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<T: Transport> RetryingTransport<T> {
    /// Wrap `inner` with the given policy, bound to `cancel`.
    pub fn new(inner: T, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            inner,
            policy,
            cancel,
        }
    }

    async fn attempt(&self, request: Request) -> Result<Response, TransportError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.inner.execute(request) => result,
        }
    }

    async fn wait(&self, delay: Duration) -> Result<(), TransportError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TransportError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, TransportError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TransportError::Cancelled),
            body = self.inner.read_body(response) => body,
        }
    }

    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let mut backoff = self.policy.initial_backoff;
        let mut retries = 0;

        loop {
            let attempt = request
                .try_clone()
                .ok_or(TransportError::BodyNotReplayable)?;
            let response = self.attempt(attempt).await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS
                || retries == self.policy.max_retries
            {
                return Ok(response);
            }

            let delay = match retry_after(&response) {
                Some(delay) => delay,
                None => {
                    let delay = backoff;
                    backoff = backoff.saturating_mul(2);
                    delay
                }
            };
            // Release the connection before sleeping
            drop(response);

            retries += 1;
            tracing::warn!(
                url = %request.url(),
                delay = ?delay,
                attempt = retries,
                max_retries = self.policy.max_retries,
                "Rate limited by tracker, retrying"
            );

            self.wait(delay).await?;
        }
    }
}

/// Server-directed delay from a positive integer `Retry-After` header.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
