use std::time::Duration;

use weighnode_traits::Clock;

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps `poll_interval` on `clock` between polls.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
    clock: &impl Clock,
) -> Result<()> {
    let deadline = clock.now() + timeout;
    while is_high() {
        if clock.now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        clock.sleep(poll_interval);
    }
    Ok(())
}
