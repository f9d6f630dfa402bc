//! Retry policy for calls to the external image service.
//!
//! Failures are classified by substring markers in their description:
//! rate limits, server errors and transport failures are transient and
//! retried with exponential backoff and jitter; everything else is fatal and
//! returned on the spot.

use rand::Rng;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::models::RetryConfig;

/// Markers of a provider-side rate limit or quota exhaustion
pub const RATE_LIMIT_MARKERS: &[&str] = &["429", "RESOURCE_EXHAUSTED"];

/// Markers of a provider-side server error
pub const SERVER_ERROR_MARKERS: &[&str] = &["500", "503"];

/// Markers of a transport failure before a response arrived
pub const TRANSPORT_MARKERS: &[&str] = &["network error", "fetch failed"];

/// Lower bound for any backoff sleep
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Symmetric jitter as a fraction of the computed delay
const JITTER_FRACTION: f64 = 0.25;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimit,
    ServerError,
    Transport,
    Fatal,
}

impl FailureKind {
    /// Classify an error description. Rate-limit markers win over the others.
    pub fn classify(description: &str) -> Self {
        let has_any = |markers: &[&str]| markers.iter().any(|m| description.contains(m));

        if has_any(RATE_LIMIT_MARKERS) {
            FailureKind::RateLimit
        } else if has_any(SERVER_ERROR_MARKERS) {
            FailureKind::ServerError
        } else if has_any(TRANSPORT_MARKERS) {
            FailureKind::Transport
        } else {
            FailureKind::Fatal
        }
    }

    pub fn is_transient(self) -> bool {
        !matches!(self, FailureKind::Fatal)
    }

    fn backoff_factor(self) -> f64 {
        match self {
            FailureKind::RateLimit => 2.5,
            _ => 2.0,
        }
    }
}

/// Diagnostic emitted before each retry sleep
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    /// 1-indexed attempt that just failed
    pub attempt: u32,
    pub kind: FailureKind,
    /// Sleep before the next attempt
    pub delay: Duration,
    pub error: String,
}

/// Attempt budget and backoff base for one external call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff before jitter and floor: `base * factor^(attempt - 1)`
    pub fn base_backoff(&self, attempt: u32, kind: FailureKind) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * kind.backoff_factor().powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Final delay for a given jitter sample in `-1.0..=1.0`.
    ///
    /// The sample scales the ±25% jitter band; the result is floored at
    /// [`MIN_RETRY_DELAY`].
    pub fn delay_with_jitter(&self, attempt: u32, kind: FailureKind, sample: f64) -> Duration {
        let base = self.base_backoff(attempt, kind).as_secs_f64();
        let jittered = base * (1.0 + sample.clamp(-1.0, 1.0) * JITTER_FRACTION);
        Duration::try_from_secs_f64(jittered)
            .unwrap_or(Duration::MAX)
            .max(MIN_RETRY_DELAY)
    }

    fn jittered_delay(&self, attempt: u32, kind: FailureKind) -> Duration {
        let sample = rand::thread_rng().gen_range(-1.0..=1.0);
        self.delay_with_jitter(attempt, kind, sample)
    }

    /// Run `op` under this policy without retry notifications.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(op, |_| async {}).await
    }

    /// Run `op` under this policy, awaiting `on_retry` before every backoff sleep.
    ///
    /// Makes at most `max_attempts + 1` calls. Fatal errors and the error of
    /// the last allowed attempt are returned unchanged.
    pub async fn execute_with<T, E, F, Fut, N, NFut>(&self, mut op: F, mut on_retry: N) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        N: FnMut(RetryNotice) -> NFut,
        NFut: Future<Output = ()>,
    {
        let mut attempt: u32 = 1;

        loop {
            let error = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "External call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            let description = error.to_string();
            let kind = FailureKind::classify(&description);

            if !kind.is_transient() {
                tracing::debug!(attempt, error = %description, "Fatal failure, not retrying");
                return Err(error);
            }

            if attempt > self.max_attempts {
                tracing::warn!(
                    attempts = attempt,
                    kind = ?kind,
                    error = %description,
                    "Retry budget exhausted"
                );
                return Err(error);
            }

            drop(error);
            let delay = self.jittered_delay(attempt, kind);
            tracing::warn!(
                attempt,
                kind = ?kind,
                delay_ms = delay.as_millis() as u64,
                error = %description,
                "Transient failure, backing off"
            );

            on_retry(RetryNotice {
                attempt,
                kind,
                delay,
                error: description,
            })
            .await;

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
