//! Small arithmetic and time helpers for weighnode_core.

use std::time::{Duration, Instant};

use weighnode_traits::Clock;

/// Mean of `n` samples summed in `sum`, rounded to nearest with ties away
/// from zero and clamped to the i32 range. `n == 0` yields 0.
#[inline]
pub fn mean_rounded_i32(sum: i64, n: u32) -> i32 {
    if n == 0 {
        return 0;
    }
    let n = i64::from(n);
    let q = if sum >= 0 {
        (sum + n / 2) / n
    } else {
        (sum - n / 2) / n
    };
    q.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Milliseconds as a `Duration`.
#[inline]
pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Wrapping 32-bit millisecond tick since `epoch`, as a free-running
/// hardware tick counter would report it.
#[inline]
pub fn tick_ms<C: Clock + ?Sized>(clock: &C, epoch: Instant) -> u32 {
    clock.ms_since(epoch) as u32
}
