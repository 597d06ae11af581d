//! Time source for bounded waits
//!
//! Every timeout in the bridge is measured against a [`Clock`], which lets
//! tests run the handshakes on simulated time.

/// Monotonic microsecond clock with a busy-wait delay
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin
    fn now_us(&self) -> u64;

    /// Busy-wait for the given number of microseconds
    fn delay_us(&self, us: u32);

    /// Microseconds elapsed since `start_us`
    fn elapsed_us(&self, start_us: u64) -> u64 {
        self.now_us().saturating_sub(start_us)
    }
}

