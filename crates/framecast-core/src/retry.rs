//! Backoff calculation for reconnect loops.
//!
//! Sync-only math. The client crate supplies the randomness and does the
//! sleeping.

use std::time::Duration;

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter factor (`0.0..=1.0`).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Exponential backoff delay with symmetric jitter, in milliseconds.
///
/// Formula: `min(max_delay, base_delay * 2^attempt) * (1 + (random * 2 - 1) * jitter)`
///
/// `attempt` is zero-based. `random` should be in `[0.0, 1.0)`; a value of
/// `0.5` yields the un-jittered delay. The jittered result is never negative.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_ms(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_delay_ms);

    // Maps random [0,1) to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor.clamp(0.0, 1.0);
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round().max(0.0) as u64
}

/// [`backoff_delay_ms`] over [`Duration`]s.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn backoff_delay(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    random: f64,
) -> Duration {
    Duration::from_millis(backoff_delay_ms(
        attempt,
        base_delay.as_millis() as u64,
        max_delay.as_millis() as u64,
        jitter_factor,
        random,
    ))
}
