use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::http::ApiResponse;

/// Maximum attempts for chat API writes.
pub const MAX_ATTEMPTS: u32 = 3;

/// Wait after a non-rate-limit failure.
pub const ERROR_DELAY: Duration = Duration::from_secs(1);

/// Wait on a 429 that carries no retry hint.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

/// Longest 429 wait honored; larger hints are capped.
pub const MAX_RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);

/// Margin added on top of the server's retry hint.
pub const RATE_LIMIT_JITTER: Duration = Duration::from_millis(250);

/// What a single attempt produced.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// HTTP 429, with the server's retry hint if it sent one.
    RateLimited(Option<Duration>),
    Failed(anyhow::Error),
}

/// Map a chat API response to an [`Attempt`]: 2xx is done, 429 is rate
/// limited, everything else (including no response) failed.
pub fn classify_response(result: Result<ApiResponse>) -> Attempt<ApiResponse> {
    match result {
        Ok(resp) if resp.is_success() => Attempt::Done(resp),
        Ok(resp) if resp.is_rate_limited() => Attempt::RateLimited(resp.retry_after()),
        Ok(resp) => Attempt::Failed(anyhow::anyhow!(
            "HTTP {}: {}",
            resp.status,
            truncate(&resp.body, 200)
        )),
        Err(e) => Attempt::Failed(e),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Fixed-count linear retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub error_delay: Duration,
    pub default_rate_limit_delay: Duration,
    pub max_rate_limit_delay: Duration,
    pub rate_limit_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            error_delay: ERROR_DELAY,
            default_rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            max_rate_limit_delay: MAX_RATE_LIMIT_DELAY,
            rate_limit_jitter: RATE_LIMIT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given how the last one ended.
    pub fn delay_for<T>(&self, attempt: &Attempt<T>) -> Duration {
        match attempt {
            Attempt::Done(_) => Duration::ZERO,
            Attempt::RateLimited(hint) => hint
                .unwrap_or(self.default_rate_limit_delay)
                .min(self.max_rate_limit_delay)
                .saturating_add(self.rate_limit_jitter),
            Attempt::Failed(_) => self.error_delay,
        }
    }

    /// Run `op` until it returns [`Attempt::Done`] or attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. No sleep follows the final attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=max {
            let outcome = op(attempt).await;
            let delay = self.delay_for(&outcome);
            match outcome {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited(_) => {
                    warn!("{label}: rate limited (attempt {attempt}/{max})");
                    last_err = Some(anyhow::anyhow!("{label}: rate limited"));
                }
                Attempt::Failed(e) => {
                    warn!("{label}: attempt {attempt}/{max} failed: {e:#}");
                    last_err = Some(e);
                }
            }
            if attempt < max {
                warn!("{label}: retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }

        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("{label}: retry exhausted"));
        Err(err.context(format!("{label}: gave up after {max} attempts")))
    }
}
