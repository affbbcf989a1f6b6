use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Method;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub retryable_status_codes: Vec<u16>,
    pub retryable_methods: Vec<Method>,
    /// Fraction of each delay randomised in either direction.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            retryable_status_codes: RETRYABLE_STATUS_CODES.to_vec(),
            retryable_methods: vec![Method::GET, Method::PUT],
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that sends every request exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    pub fn with_jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    pub fn is_retryable_method(&self, method: &Method) -> bool {
        self.retryable_methods.contains(method)
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn backoff_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);
        self.apply_jitter(delay)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= f64::EPSILON || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter_ratio)..=(1.0 + self.jitter_ratio));
        delay.mul_f64(factor).min(self.max_backoff)
    }

    fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff_for_retry(retry);
        match retry_after {
            Some(hint) => backoff.max(hint).min(self.max_backoff),
            None => backoff,
        }
    }
}

fn retry_after(resp: &HttpResponse) -> Option<Duration> {
    resp.header_str("retry-after")?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Wraps a transport and replays retryable requests per a [`RetryPolicy`].
pub struct RetryingTransport {
    inner: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let retryable_method = self.policy.is_retryable_method(&request.method);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let can_retry = retryable_method && attempt < max_attempts;
            match self.inner.send(request.clone()).await {
                Ok(resp) if can_retry && self.policy.is_retryable_status(resp.status().as_u16()) => {
                    let delay = self.policy.delay_for(attempt, retry_after(&resp));
                    tracing::debug!(
                        "{} {} returned {}; retry {}/{} in {:?}",
                        request.method,
                        request.url,
                        resp.status(),
                        attempt,
                        max_attempts - 1,
                        delay
                    );
                    drop(resp);
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) => return Ok(resp),
                Err(err) if can_retry => {
                    let delay = self.policy.delay_for(attempt, None);
                    tracing::debug!(
                        "{} {} failed: {}; retry {}/{} in {:?}",
                        request.method,
                        request.url,
                        err,
                        attempt,
                        max_attempts - 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
            attempt += 1;
        }
    }
}
