//! Retry policy: attempt counting, delay schedules, and jitter.
//!
//! Delays are computed per attempt from the configured backoff shape, a
//! uniform jitter in `[-j*raw, +j*raw]` is added, and the result is clamped
//! to `[0, max_delay]`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{McpResult, TransportError};

/// Shape of the delay schedule.
#[derive(Clone, Default)]
pub enum Backoff {
    /// `base_delay` every attempt
    Constant,
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * 2^(attempt-1)`
    #[default]
    Exponential,
    /// User-supplied function of the attempt index (1-based)
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    fn name(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PartialEq for Backoff {
    fn eq(&self, other: &Self) -> bool {
        // custom functions are never comparable
        match (self, other) {
            (Self::Custom(_), _) | (_, Self::Custom(_)) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Serialize for Backoff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Backoff {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        match name.as_str() {
            "constant" => Ok(Self::Constant),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(de::Error::unknown_variant(
                other,
                &["constant", "linear", "exponential"],
            )),
        }
    }
}

/// Retry schedule for transient transport failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay the backoff shape scales.
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Jitter fraction in `[0, 1]`.
    pub jitter: f64,

    /// Shape of the delay schedule.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Replace the base delay, e.g. after an SSE `retry:` directive.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// The raw (un-jittered) delay for a 1-based attempt index.
    fn raw_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match &self.backoff {
            Backoff::Constant => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX)),
            Backoff::Custom(f) => f(attempt),
        }
    }

    /// The delay to sleep after a failed 1-based attempt, jittered and
    /// clamped to `[0, max_delay]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        let jittered = if self.jitter > 0.0 {
            let spread = raw.as_secs_f64() * self.jitter.clamp(0.0, 1.0);
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            Duration::try_from_secs_f64((raw.as_secs_f64() + offset).max(0.0))
                .unwrap_or(Duration::ZERO)
        } else {
            raw
        };
        jittered.min(self.max_delay)
    }

    /// Run `op` up to `max_attempts` times, sleeping the scheduled delay
    /// between attempts.
    ///
    /// The final failure is wrapped as
    /// `OperationFailed("<label> failed after N attempts: <last_error>")`.
    pub async fn with_retry<T, F, Fut>(&self, label: &str, mut op: F) -> McpResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = McpResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::debug!(
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "{label} attempt failed"
                    );
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(TransportError::OperationFailed {
            detail: format!(
                "{label} failed after {attempts} attempts: {}",
                last_error.expect("at least one attempt ran")
            ),
        }
        .into())
    }
}
