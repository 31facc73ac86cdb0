//! Timeout, retry and rate limiting around any advisory service.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::error::TraderError;
use crate::domain::recommendation::Recommendation;
use crate::ports::advisory_port::{AdvisoryPort, AnalysisRequest};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Backoff before retry `n` (0-based) is `initial_backoff * 2^n`.
    pub initial_backoff: Duration,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Minimum spacing between the starts of two calls.
    pub min_interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            timeout: Duration::from_millis(5000),
            min_interval: Duration::ZERO,
        }
    }
}

impl RetrySettings {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let millis = |key: &str, default: u64| {
            let value = config.get_int("advisory", key, default as i64);
            Duration::from_millis(u64::try_from(value).unwrap_or(default))
        };
        let defaults = RetrySettings::default();
        RetrySettings {
            max_retries: u32::try_from(config.get_int(
                "advisory",
                "max_retries",
                i64::from(defaults.max_retries),
            ))
            .unwrap_or(defaults.max_retries),
            initial_backoff: millis("initial_backoff_ms", 200),
            timeout: millis("timeout_ms", 5000),
            min_interval: millis("min_interval_ms", 0),
        }
    }

    fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

fn is_transient(err: &TraderError) -> bool {
    matches!(err, TraderError::AdvisoryUnavailable { .. } | TraderError::Io(_))
}

pub struct RetryingAdvisor<A> {
    inner: A,
    settings: RetrySettings,
    last_call: Mutex<Option<Instant>>,
}

impl<A: AdvisoryPort> RetryingAdvisor<A> {
    pub fn new(inner: A, settings: RetrySettings) -> Self {
        RetryingAdvisor {
            inner,
            settings,
            last_call: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn wait_for_slot(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + self.settings.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    async fn attempt(&self, request: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        self.wait_for_slot().await;
        match tokio::time::timeout(self.settings.timeout, self.inner.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(TraderError::AdvisoryUnavailable {
                reason: format!("timed out after {}ms", self.settings.timeout.as_millis()),
            }),
        }
    }
}

impl<A: AdvisoryPort> AdvisoryPort for RetryingAdvisor<A> {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Recommendation, TraderError> {
        let mut retry = 0u32;
        loop {
            match self.attempt(request).await {
                Ok(rec) => break Ok(rec),
                Err(err) if !is_transient(&err) || retry >= self.settings.max_retries => {
                    break Err(err);
                }
                Err(err) => {
                    let delay = self.settings.backoff(retry);
                    log::warn!(
                        "Attempt {}/{} for {} analysis failed: {}. Retrying in {}ms.",
                        retry + 1,
                        self.settings.max_retries + 1,
                        request.symbol,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}
