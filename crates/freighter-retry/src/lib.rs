//! Bounded exponential backoff.
//!
//! Every network call freighter makes goes through [`retry`], so transient
//! registry trouble is absorbed the same way everywhere: exponential delay
//! between attempts, capped, with jitter to keep concurrent publishes from
//! stampeding.

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cap on the exponent so the uncapped delay cannot overflow.
const MAX_EXPONENT: u32 = 16;

/// Backoff policy shared by every registry call.
///
/// Deserializes from `.freighter.toml` with humantime strings, so
/// `base_delay = "500ms"` and `max_delay = "1m"` read naturally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Total attempts, including the first. Clamped to at least one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter fraction in `[0, 1)`; 0.3 means each delay is scaled by a
    /// random factor in `[0.7, 1.3]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_jitter() -> f64 {
    0.3
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

/// Delay to sleep after failed attempt `attempt` (1-based).
///
/// Doubles per attempt from `base_delay`, capped at `max_delay`, then
/// jittered. The jitter factor may push the result slightly past the cap.
pub fn delay_for_attempt(config: &BackoffConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    let uncapped = config.base_delay.saturating_mul(1u32 << exponent);
    apply_jitter(uncapped.min(config.max_delay), config.jitter)
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let jitter = jitter.min(0.99);
    let roll: f64 = rand::rng().random();
    let factor = 1.0 - jitter + roll * 2.0 * jitter;
    delay.mul_f64(factor)
}

/// Run `op` until it succeeds or attempts are exhausted, sleeping the
/// backoff delay between attempts. `op` receives the 1-based attempt
/// number; the final error is returned unchanged.
pub fn retry<T, E, F>(config: &BackoffConfig, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(_) => {
                thread::sleep(delay_for_attempt(config, attempt));
                attempt += 1;
            }
        }
    }
}
