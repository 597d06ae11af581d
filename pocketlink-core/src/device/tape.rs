//! Tape tone codec
//!
//! The pocket computer's cassette interface uses two tones with a fixed 2 ms
//! bit period: a `1` is eight cycles at 4 kHz, a `0` is four cycles at
//! 2 kHz. A byte is sent as its high nibble then its low nibble, each framed
//! as one start bit `0`, four data bits LSB first, and two stop bits `1`.
//!
//! Writes go out on XIN, reads are decoded from XOUT half-periods.

use pocketlink_hal::Clock;
use pocketlink_protocol::{ErrorKind, Status};

use super::DeviceLink;
use crate::traits::{InputLine, OutputLine, SharpBus};

pub const BIT_PERIOD_US: u32 = 2_000;
pub const ONE_HALF_PERIOD_US: u32 = 125;
pub const ZERO_HALF_PERIOD_US: u32 = 250;

/// Ones sent before the first byte so the computer can lock on
pub const LEADER_BITS: u16 = 2_500;

/// Ones sent after the last byte
const TRAILER_BITS: u8 = 2;

const ONE_HALVES: u32 = BIT_PERIOD_US / ONE_HALF_PERIOD_US;
const ZERO_HALVES: u32 = BIT_PERIOD_US / ZERO_HALF_PERIOD_US;

// Classification bounds for a measured half-period
const SHORT_LIMIT_US: u64 = 187;
const LONG_LIMIT_US: u64 = 400;

/// Half-periods skipped while hunting for a start bit before giving up
const SYNC_LIMIT_HALVES: u32 = LEADER_BITS as u32 * ONE_HALVES * 4;

/// Reader position on XOUT
#[derive(Debug, Clone, Copy)]
pub(super) struct TapeState {
    level: bool,
    last_edge_us: u64,
    bytes: u32,
}

impl TapeState {
    pub(super) const fn new() -> Self {
        Self {
            level: false,
            last_edge_us: 0,
            bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    Short,
    Long,
    Gap,
}

fn classify(width_us: u64) -> Half {
    if width_us < SHORT_LIMIT_US {
        Half::Short
    } else if width_us <= LONG_LIMIT_US {
        Half::Long
    } else {
        Half::Gap
    }
}

/// Silence inside a byte means the recording was cut
fn silence_is_sync(kind: ErrorKind) -> ErrorKind {
    match kind {
        ErrorKind::Timeout => ErrorKind::SyncError,
        other => other,
    }
}

impl<B: SharpBus, C: Clock> DeviceLink<B, C> {
    /// Send the leader tone
    pub fn begin_tape_write(&mut self) {
        for _ in 0..LEADER_BITS {
            self.write_tape_bit(true);
        }
    }

    pub fn write_tape_byte(&mut self, value: u8) {
        self.write_tape_nibble(value >> 4);
        self.write_tape_nibble(value & 0x0F);
    }

    /// Send the trailer and release XIN
    pub fn end_tape_write(&mut self) {
        for _ in 0..TRAILER_BITS {
            self.write_tape_bit(true);
        }
        self.bus.drive(OutputLine::Xin, false);
    }

    /// Wait for the first tone edge on XOUT
    ///
    /// `cancelled` is polled on every step and ends the wait with
    /// `Cancelled`.
    pub fn begin_tape_read<F>(&mut self, timeout_ms: u32, mut cancelled: F) -> Status<()>
    where
        F: FnMut() -> bool,
    {
        let start = self.clock.now_us();
        let level = self.bus.sample(InputLine::Xout);
        let limit_us = u64::from(timeout_ms) * 1000;
        loop {
            if self.bus.sample(InputLine::Xout) != level {
                self.tape = TapeState {
                    level: !level,
                    last_edge_us: self.clock.now_us(),
                    bytes: 0,
                };
                return Ok(());
            }
            if cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            if self.clock.elapsed_us(start) >= limit_us {
                return Err(ErrorKind::Timeout);
            }
            self.clock.delay_us(self.timing.poll_interval_us);
        }
    }

    /// Decode the next byte from XOUT
    ///
    /// Silence before the first byte is `Timeout`, silence after at least
    /// one byte is `End`, and a malformed bit is `SyncError`. `cancelled`
    /// is polled between half-periods while hunting for the start bit.
    pub fn read_tape_byte<F>(&mut self, mut cancelled: F) -> Status<u8>
    where
        F: FnMut() -> bool,
    {
        match self.find_start_bit(&mut cancelled) {
            Ok(()) => {}
            Err(ErrorKind::Timeout) if self.tape.bytes > 0 => return Err(ErrorKind::End),
            Err(kind) => return Err(kind),
        }
        let high = self.read_tape_nibble()?;
        self.find_start_bit(&mut || false).map_err(silence_is_sync)?;
        let low = self.read_tape_nibble()?;

        self.tape.bytes = self.tape.bytes.saturating_add(1);
        Ok((high << 4) | low)
    }

    fn write_tape_nibble(&mut self, nibble: u8) {
        self.write_tape_bit(false);
        for i in 0..4 {
            self.write_tape_bit(nibble & (1 << i) != 0);
        }
        self.write_tape_bit(true);
        self.write_tape_bit(true);
    }

    fn write_tape_bit(&mut self, bit: bool) {
        let (half_us, halves) = if bit {
            (ONE_HALF_PERIOD_US, ONE_HALVES)
        } else {
            (ZERO_HALF_PERIOD_US, ZERO_HALVES)
        };
        for i in 0..halves {
            self.bus.drive(OutputLine::Xin, i % 2 == 0);
            self.clock.delay_us(half_us);
        }
    }

    /// Data and stop bits of one nibble, after its start bit
    fn read_tape_nibble(&mut self) -> Status<u8> {
        let mut nibble = 0u8;
        for i in 0..4 {
            if self.read_tape_bit()? {
                nibble |= 1 << i;
            }
        }
        for _ in 0..2 {
            if !self.read_tape_bit()? {
                return Err(ErrorKind::SyncError);
            }
        }
        Ok(nibble)
    }

    fn read_tape_bit(&mut self) -> Status<bool> {
        let (kind, halves) = match self.read_half().map_err(silence_is_sync)? {
            Half::Short => (Half::Short, ONE_HALVES),
            Half::Long => (Half::Long, ZERO_HALVES),
            Half::Gap => return Err(ErrorKind::SyncError),
        };
        for _ in 1..halves {
            if self.read_half().map_err(silence_is_sync)? != kind {
                return Err(ErrorKind::SyncError);
            }
        }
        Ok(kind == Half::Short)
    }

    /// Skip ones and gaps, then consume a whole start bit
    fn find_start_bit(&mut self, cancelled: &mut dyn FnMut() -> bool) -> Status<()> {
        let mut skipped = 0u32;
        loop {
            if cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            if self.read_half()? == Half::Long {
                break;
            }
            skipped += 1;
            if skipped >= SYNC_LIMIT_HALVES {
                return Err(ErrorKind::Timeout);
            }
        }
        for _ in 1..ZERO_HALVES {
            if self.read_half().map_err(silence_is_sync)? != Half::Long {
                return Err(ErrorKind::SyncError);
            }
        }
        Ok(())
    }

    /// Width of the next XOUT half-period, or `Timeout` on silence
    fn read_half(&mut self) -> Status<Half> {
        let silence_us = u64::from(self.timing.tape_silence_ms) * 1000;
        loop {
            let level = self.bus.sample(InputLine::Xout);
            let now = self.clock.now_us();
            let width = now.saturating_sub(self.tape.last_edge_us);
            if level != self.tape.level {
                self.tape.level = level;
                self.tape.last_edge_us = now;
                return Ok(classify(width));
            }
            if width >= silence_us {
                return Err(ErrorKind::Timeout);
            }
            self.clock.delay_us(self.timing.poll_interval_us);
        }
    }
}
