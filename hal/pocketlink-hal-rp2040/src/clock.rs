//! Clock backed by the embassy time driver

use embassy_time::{block_for, Duration, Instant};
use pocketlink_hal::Clock;

/// Monotonic clock for the bounded waits
///
/// Delays spin on the timer; they run inside the dispatcher and must not
/// yield to the executor mid-handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpClock;

impl Clock for RpClock {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }

    fn delay_us(&self, us: u32) {
        block_for(Duration::from_micros(u64::from(us)));
    }
}
