//! Device Link
//!
//! Bit-level handshakes with the pocket computer. Every operation is a
//! synchronous busy-poll bounded by the timing contract; nothing here
//! talks to the host.
//!
//! Byte transfers are LSB first. Per bit the link walks
//! `Idle → Asserting → WaitingAck → Settling → Idle`. A failure leaves the
//! phase where it happened so the dispatcher can tell an interrupted
//! handshake from a clean one.

pub mod pins;
pub mod tape;

use pocketlink_hal::Clock;
use pocketlink_protocol::{ErrorKind, Status};

use crate::config::TimingConfig;
use crate::traits::{InputLine, OutputLine, SharpBus};

pub use pins::{BusInputs, BusOutputs, SharpPins};
pub use tape::LEADER_BITS;

/// Longest disk command accepted from the computer
pub const MAX_DISK_COMMAND: usize = 256;

/// Beeper half period (2 kHz tone)
const BEEP_HALF_PERIOD_US: u32 = 250;

/// Handshake phase of the bit in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Between bits; lines are consistent
    Idle,
    /// Bridge is driving its side of the bit
    Asserting,
    /// Waiting for the computer to raise BUSY
    WaitingAck,
    /// Sampling and waiting for BUSY to drop
    Settling,
}

/// Handshake driver for the pocket computer bus
pub struct DeviceLink<B, C> {
    bus: B,
    clock: C,
    timing: TimingConfig,
    phase: Phase,
    tape: tape::TapeState,
}

impl<B: SharpBus, C: Clock> DeviceLink<B, C> {
    /// Take ownership of the bus and re-arm every output
    pub fn new(bus: B, clock: C, timing: TimingConfig) -> Self {
        let mut link = Self {
            bus,
            clock,
            timing,
            phase: Phase::Idle,
            tape: tape::TapeState::new(),
        };
        link.reset();
        link
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Drive every output low and return to `Idle`
    pub fn reset(&mut self) {
        self.bus.drive(OutputLine::Ack, false);
        self.bus.drive(OutputLine::Din, false);
        self.bus.drive(OutputLine::Xin, false);
        self.bus.drive(OutputLine::Beep, false);
        self.phase = Phase::Idle;
    }

    /// Device number encoded on the select lines (0..=3)
    pub fn read_device_select(&mut self) -> Status<u8> {
        let sel1 = self.bus.sample(InputLine::Sel1) as u8;
        let sel2 = self.bus.sample(InputLine::Sel2) as u8;
        Ok(sel1 | (sel2 << 1))
    }

    /// Receive one byte with the byte-in handshake
    pub fn read_print_byte(&mut self) -> Status<u8> {
        let mut value = 0u8;
        for bit in 0..8 {
            if self.receive_bit()? {
                value |= 1 << bit;
            }
        }
        if self.bus.sample(InputLine::Busy) {
            return Err(ErrorKind::SyncError);
        }
        Ok(value)
    }

    /// Drive one byte with the byte-out handshake
    pub fn send_disk_byte(&mut self, value: u8) -> Status<()> {
        for bit in 0..8 {
            self.send_bit(value & (1 << bit) != 0)?;
        }
        Ok(())
    }

    /// Wait for the computer to raise XOUT
    ///
    /// `cancelled` is polled on every step and ends the wait with
    /// `Cancelled`.
    pub fn wait_transfer_start<F>(&mut self, timeout_ms: u32, mut cancelled: F) -> Status<()>
    where
        F: FnMut() -> bool,
    {
        self.wait_line(
            InputLine::Xout,
            true,
            u64::from(timeout_ms) * 1000,
            &mut cancelled,
        )
    }

    /// Receive a disk command while XOUT stays high
    ///
    /// Each byte goes to `forward` as soon as it arrives; an error from
    /// `forward` aborts the command. Returns the number of bytes received.
    pub fn process_disk_command<F>(&mut self, mut forward: F) -> Status<usize>
    where
        F: FnMut(u8) -> Status<()>,
    {
        let mut count = 0;
        while self.bus.sample(InputLine::Xout) {
            if count == MAX_DISK_COMMAND {
                return Err(ErrorKind::Overflow);
            }
            let byte = self.read_print_byte()?;
            forward(byte)?;
            count += 1;
        }
        Ok(count)
    }

    /// Toggle the beeper for `cycles` periods
    pub fn beep(&mut self, cycles: u16) {
        for _ in 0..cycles {
            self.bus.drive(OutputLine::Beep, true);
            self.clock.delay_us(BEEP_HALF_PERIOD_US);
            self.bus.drive(OutputLine::Beep, false);
            self.clock.delay_us(BEEP_HALF_PERIOD_US);
        }
    }

    fn receive_bit(&mut self) -> Status<bool> {
        self.phase = Phase::Asserting;
        if self.bus.sample(InputLine::Busy) {
            return Err(ErrorKind::SyncError);
        }
        self.bus.drive(OutputLine::Ack, true);

        self.phase = Phase::WaitingAck;
        self.wait_busy(true)?;

        self.phase = Phase::Settling;
        self.clock.delay_us(self.timing.settle_us);
        let bit = self.bus.sample(InputLine::Dout);
        self.bus.drive(OutputLine::Ack, false);
        self.wait_busy(false)?;

        self.phase = Phase::Idle;
        Ok(bit)
    }

    fn send_bit(&mut self, bit: bool) -> Status<()> {
        self.phase = Phase::Asserting;
        if self.bus.sample(InputLine::Busy) {
            return Err(ErrorKind::SyncError);
        }
        self.bus.drive(OutputLine::Din, bit);
        self.clock.delay_us(self.timing.settle_us);
        self.bus.drive(OutputLine::Ack, true);

        self.phase = Phase::WaitingAck;
        self.wait_busy(true)?;

        self.phase = Phase::Settling;
        self.bus.drive(OutputLine::Ack, false);
        self.wait_busy(false)?;

        self.phase = Phase::Idle;
        Ok(())
    }

    fn wait_busy(&mut self, high: bool) -> Status<()> {
        let timeout_us = u64::from(self.timing.handshake_timeout_us);
        self.wait_line(InputLine::Busy, high, timeout_us, &mut || false)
    }

    fn wait_line(
        &mut self,
        line: InputLine,
        high: bool,
        timeout_us: u64,
        cancelled: &mut dyn FnMut() -> bool,
    ) -> Status<()> {
        let start = self.clock.now_us();
        loop {
            if self.bus.sample(line) == high {
                return Ok(());
            }
            if cancelled() {
                return Err(ErrorKind::Cancelled);
            }
            if self.clock.elapsed_us(start) >= timeout_us {
                return Err(ErrorKind::Timeout);
            }
            self.clock.delay_us(self.timing.poll_interval_us);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SimBus, SimClock};

    fn link(bus: &SimBus, clock: &SimClock) -> DeviceLink<SimBus, SimClock> {
        DeviceLink::new(bus.clone(), clock.clone(), TimingConfig::DEFAULT)
    }

    #[test]
    fn test_new_rearms_outputs() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().ack = true;
        bus.state().xin = true;
        let link = link(&bus, &clock);
        assert_eq!(link.phase(), Phase::Idle);
        assert!(!bus.state().ack);
        assert!(!bus.state().xin);
    }

    #[test]
    fn test_read_device_select() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        let mut link = link(&bus, &clock);
        for select in 0..4 {
            bus.state().select = select;
            assert_eq!(link.read_device_select(), Ok(select));
        }
    }

    #[test]
    fn test_read_print_byte() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().talk.extend([0xA5, 0x01]);
        let mut link = link(&bus, &clock);

        assert_eq!(link.read_print_byte(), Ok(0xA5));
        assert_eq!(link.read_print_byte(), Ok(0x01));
        assert_eq!(link.phase(), Phase::Idle);
        assert!(!bus.state().ack);
    }

    #[test]
    fn test_read_print_byte_timeout_when_unresponsive() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().responsive = false;
        let mut link = link(&bus, &clock);

        let start = clock.peek();
        assert_eq!(link.read_print_byte(), Err(ErrorKind::Timeout));
        assert_eq!(link.phase(), Phase::WaitingAck);
        let waited = clock.peek() - start;
        let bound = u64::from(TimingConfig::DEFAULT.handshake_timeout_us);
        assert!(waited >= bound && waited < bound + 100);

        link.reset();
        assert_eq!(link.phase(), Phase::Idle);
        assert!(!bus.state().ack);
    }

    #[test]
    fn test_busy_high_before_bit_is_sync_error() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().busy_stuck = true;
        let mut link = link(&bus, &clock);

        assert_eq!(link.read_print_byte(), Err(ErrorKind::SyncError));
        assert_eq!(link.send_disk_byte(0x00), Err(ErrorKind::SyncError));
        assert_ne!(link.phase(), Phase::Idle);
    }

    #[test]
    fn test_send_disk_byte() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        let mut link = link(&bus, &clock);

        assert_eq!(link.send_disk_byte(0x3C), Ok(()));
        assert_eq!(link.send_disk_byte(0xFF), Ok(()));
        assert_eq!(bus.state().received, vec![0x3C, 0xFF]);
        assert_eq!(link.phase(), Phase::Idle);
    }

    #[test]
    fn test_process_disk_command_forwards_each_byte() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().disk_command = true;
        bus.state().talk.extend([0x41, 0x10, 0x03]);
        let mut link = link(&bus, &clock);

        let mut seen = Vec::new();
        let count = link.process_disk_command(|b| {
            seen.push(b);
            Ok(())
        });
        assert_eq!(count, Ok(3));
        assert_eq!(seen, vec![0x41, 0x10, 0x03]);
    }

    #[test]
    fn test_process_disk_command_forward_abort() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().disk_command = true;
        bus.state().talk.extend([1, 2, 3]);
        let mut link = link(&bus, &clock);

        let result = link.process_disk_command(|b| {
            if b == 2 {
                Err(ErrorKind::Cancelled)
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(ErrorKind::Cancelled));
        // The byte handshake itself completed
        assert_eq!(link.phase(), Phase::Idle);
    }

    #[test]
    fn test_process_disk_command_overflow() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        bus.state().disk_command = true;
        bus.state().talk.extend((0..MAX_DISK_COMMAND + 4).map(|i| i as u8));
        let mut link = link(&bus, &clock);

        assert_eq!(link.process_disk_command(|_| Ok(())), Err(ErrorKind::Overflow));
    }

    #[test]
    fn test_wait_transfer_start() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        let mut link = link(&bus, &clock);
        assert_eq!(link.wait_transfer_start(5, || false), Err(ErrorKind::Timeout));

        bus.state().disk_command = true;
        bus.state().talk.push_back(0x55);
        assert_eq!(link.wait_transfer_start(5, || false), Ok(()));
    }

    #[test]
    fn test_wait_transfer_start_cancelled() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        let mut link = link(&bus, &clock);

        let mut polls = 0;
        let result = link.wait_transfer_start(60_000, || {
            polls += 1;
            polls == 3
        });
        assert_eq!(result, Err(ErrorKind::Cancelled));
        assert!(clock.peek() < 100);
    }

    #[test]
    fn test_beep_toggles_line() {
        let clock = SimClock::new();
        let bus = SimBus::new(&clock);
        let mut link = link(&bus, &clock);
        link.beep(3);
        assert_eq!(bus.state().beep_pulses, 3);
        assert!(!bus.state().beep);
    }
}
