//! Retry policy: the three-layer merge, and the pure `should_retry` /
//! `delay_for` calculations.
//!
//! Grounded on the orchestration engine's `RetryPolicy`/`BackoffStrategy`
//! pair, but reshaped around a merge-of-three-layers model and an
//! `attempt^exponent · delay` backoff formula rather than a strategy enum.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A bound that is either a finite count/duration or unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound<T> {
    Finite(T),
    Unbounded,
}

impl<T> Bound<T> {
    pub fn finite(value: T) -> Self {
        Self::Finite(value)
    }
}

/// Maximum number of retries after the initial attempt.
pub type MaxAttempts = Bound<u32>;
/// Maximum delay between retries, in milliseconds.
pub type MaxDelay = Bound<u64>;

/// A fully resolved retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: MaxAttempts,
    pub delay_ms: u64,
    pub exponent: u32,
    pub max_delay_ms: MaxDelay,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Bound::Finite(5),
            delay_ms: 250,
            exponent: 4,
            max_delay_ms: Bound::Finite(3_600_000),
        }
    }
}

/// A partial override: `None` on a field means "inherit the prior layer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOverrideFields {
    pub max_attempts: Option<MaxAttempts>,
    pub delay_ms: Option<u64>,
    pub exponent: Option<u32>,
    pub max_delay_ms: Option<MaxDelay>,
}

impl RetryOverrideFields {
    fn apply_to(self, cfg: &mut RetryConfig) {
        if let Some(v) = self.max_attempts {
            cfg.max_attempts = v;
        }
        if let Some(v) = self.delay_ms {
            cfg.delay_ms = v;
        }
        if let Some(v) = self.exponent {
            cfg.exponent = v;
        }
        if let Some(v) = self.max_delay_ms {
            cfg.max_delay_ms = v;
        }
    }
}

/// A retry setting as accepted by `enqueue`/worker declarations: either one
/// of the documented shorthands, or an explicit partial override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrySetting {
    /// `max_attempts = 0`
    NoRetry,
    /// `delay = 0`
    Immediately,
    /// `delay = 0, max_attempts = N`
    ImmediatelyWithAttempts(u32),
    /// `exponent = 0, delay = d, max_delay = unbounded`
    Static(u64),
    /// Same as `Static(d)` plus `max_attempts = N`
    StaticWithAttempts(u64, u32),
    /// An explicit field-by-field override.
    Partial(RetryOverrideFields),
}

impl RetrySetting {
    fn expand(self) -> RetryOverrideFields {
        match self {
            Self::NoRetry => RetryOverrideFields {
                max_attempts: Some(Bound::Finite(0)),
                ..Default::default()
            },
            Self::Immediately => RetryOverrideFields {
                delay_ms: Some(0),
                ..Default::default()
            },
            Self::ImmediatelyWithAttempts(n) => RetryOverrideFields {
                delay_ms: Some(0),
                max_attempts: Some(Bound::Finite(n)),
                ..Default::default()
            },
            Self::Static(d) => RetryOverrideFields {
                exponent: Some(0),
                delay_ms: Some(d),
                max_delay_ms: Some(Bound::Unbounded),
                ..Default::default()
            },
            Self::StaticWithAttempts(d, n) => RetryOverrideFields {
                exponent: Some(0),
                delay_ms: Some(d),
                max_delay_ms: Some(Bound::Unbounded),
                max_attempts: Some(Bound::Finite(n)),
            },
            Self::Partial(fields) => fields,
        }
    }
}

/// Pure retry-policy calculations. Holds no state.
pub struct RetryPolicy;

impl RetryPolicy {
    /// Merge the three layers (global, worker, job) on top of the
    /// documented defaults. Each layer may be absent; a present layer's
    /// `None` fields inherit the prior layer's value rather than
    /// resetting to the default.
    pub fn resolve(
        global: Option<RetrySetting>,
        worker: Option<RetrySetting>,
        job: Option<RetrySetting>,
    ) -> RetryConfig {
        let mut cfg = RetryConfig::default();
        for layer in [global, worker, job].into_iter().flatten() {
            layer.expand().apply_to(&mut cfg);
        }
        cfg
    }

    /// `attempt` is 1-based: the first retry is attempt 1.
    pub fn should_retry(cfg: &RetryConfig, attempt: u32) -> bool {
        match cfg.max_attempts {
            Bound::Unbounded => true,
            Bound::Finite(max) => attempt <= max,
        }
    }

    /// `floor(attempt^exponent * delay)`, clamped to `max_delay` when finite.
    pub fn delay_for(cfg: &RetryConfig, attempt: u32) -> Duration {
        if cfg.delay_ms == 0 {
            return Duration::ZERO;
        }
        let scaled = (attempt as u64)
            .checked_pow(cfg.exponent)
            .unwrap_or(u64::MAX)
            .saturating_mul(cfg.delay_ms);
        let capped = match cfg.max_delay_ms {
            Bound::Unbounded => scaled,
            Bound::Finite(max) => scaled.min(max),
        };
        Duration::from_millis(capped)
    }
}
