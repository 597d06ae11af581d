//! Host Link
//!
//! Timeout-aware reads and frame-level sends over the host serial port.
//! Reads never block past their bound; every wait is measured from its own
//! start. Send failures are counted and never abort a command.

pub mod staging;

use pocketlink_hal::{Clock, Serial};
use pocketlink_protocol::ascii::{ACK, CAN, DC1, NAK, SYN};
use pocketlink_protocol::{Command, ErrorKind, FrameDecoder, FrameEncoder, Status};

use crate::config::TimingConfig;

pub use staging::{Discard, StagingBuffer, BUFFER_SIZE};

/// Reader and writer for the host side
pub struct HostLink<S, C> {
    serial: S,
    clock: C,
    byte_timeout_ms: u32,
    poll_interval_us: u32,
    /// One byte peeked by `read_cancel`
    lookahead: Option<u8>,
    encoder: FrameEncoder,
    staging: StagingBuffer,
    /// Rest of a failed bulk frame still to be skipped
    discard: Option<Discard>,
    tx_faults: u32,
}

impl<S: Serial, C: Clock> HostLink<S, C> {
    pub fn new(serial: S, clock: C, timing: &TimingConfig) -> Self {
        Self {
            serial,
            clock,
            byte_timeout_ms: timing.host_byte_timeout_ms,
            poll_interval_us: timing.poll_interval_us,
            lookahead: None,
            encoder: FrameEncoder::new(),
            staging: StagingBuffer::new(),
            discard: None,
            tx_faults: 0,
        }
    }

    /// Number of writes the serial port rejected
    pub fn tx_faults(&self) -> u32 {
        self.tx_faults
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    /// True while leftovers of a failed bulk frame are being skipped
    pub fn is_discarding(&self) -> bool {
        self.discard.is_some()
    }

    /// Next raw byte if one is waiting
    pub fn poll_byte(&mut self) -> Option<u8> {
        if let Some(byte) = self.lookahead.take() {
            return Some(byte);
        }
        self.read_live()
    }

    /// Next byte from the port that is not part of an abandoned frame
    fn read_live(&mut self) -> Option<u8> {
        loop {
            let raw = self.read_raw()?;
            if !self.swallow(raw) {
                return Some(raw);
            }
        }
    }

    /// Feed `raw` to the discard state; true if it belonged to the old frame
    ///
    /// An unescaped SYN always gets through: the host uses it to resync.
    fn swallow(&mut self, raw: u8) -> bool {
        let Some(discard) = self.discard.as_mut() else {
            return false;
        };
        if raw == SYN && !discard.is_escaped() {
            self.discard = None;
            return false;
        }
        if discard.feed(raw) {
            self.discard = None;
            #[cfg(feature = "defmt")]
            defmt::debug!("abandoned host frame skipped");
        }
        true
    }

    fn read_raw(&mut self) -> Option<u8> {
        match self.serial.try_read_byte() {
            Ok(byte) => byte,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("host rx fault");
                None
            }
        }
    }

    /// Wait up to the configured byte timeout
    pub fn wait_read_byte(&mut self) -> Status<u8> {
        self.wait_read_byte_within(self.byte_timeout_ms)
    }

    pub fn wait_read_byte_within(&mut self, timeout_ms: u32) -> Status<u8> {
        let start = self.clock.now_us();
        let limit_us = u64::from(timeout_ms) * 1000;
        loop {
            if let Some(byte) = self.poll_byte() {
                return Ok(byte);
            }
            if self.clock.elapsed_us(start) >= limit_us {
                return Err(ErrorKind::Timeout);
            }
            self.clock.delay_us(self.poll_interval_us);
        }
    }

    /// Little-endian word; a timeout on either byte fails the whole word
    pub fn wait_read_word(&mut self) -> Status<u16> {
        let lo = self.wait_read_byte()?;
        let hi = self.wait_read_byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// One escaped data byte; `End` on ETX
    pub fn wait_read_data_byte(&mut self) -> Status<u8> {
        let mut decoder = FrameDecoder::new();
        loop {
            let raw = self.wait_read_byte()?;
            if let Some(byte) = decoder.feed(raw)? {
                return Ok(byte);
            }
        }
    }

    /// Read one byte and require it to be `value`
    pub fn expect(&mut self, value: u8) -> Status<u8> {
        let byte = self.wait_read_byte()?;
        if byte == value {
            Ok(byte)
        } else {
            Err(ErrorKind::Unexpected)
        }
    }

    /// Consume a waiting CAN without blocking
    ///
    /// Any other waiting byte is kept for the next read, and a CAN queued
    /// behind it is only seen once that byte has been consumed. Looking
    /// further ahead would mistake an argument or length byte of 0x18 for
    /// a cancel.
    pub fn read_cancel(&mut self) -> bool {
        let byte = match self.lookahead.take() {
            Some(byte) => Some(byte),
            None => self.read_live(),
        };
        match byte {
            Some(CAN) => true,
            Some(other) => {
                self.lookahead = Some(other);
                false
            }
            None => false,
        }
    }

    fn write(&mut self, data: &[u8]) {
        if self.serial.write_blocking(data).is_err() {
            self.tx_faults = self.tx_faults.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("host tx fault ({=u32} total)", self.tx_faults);
        }
    }

    pub fn send_success(&mut self) {
        debug_assert!(!self.encoder.is_open(), "success sent inside a frame");
        self.write(&[ACK]);
    }

    /// Report a failure; abandons any open frame and staged transfer
    ///
    /// Whatever the host still owes of an interrupted bulk frame is skipped
    /// on later reads, so it is never taken for an opcode.
    pub fn send_failure(&mut self, kind: ErrorKind) {
        self.encoder.abort();
        self.abandon_transfer();
        self.write(&[NAK, kind.code()]);
    }

    fn abandon_transfer(&mut self) {
        if let Some(discard) = self.staging.discard_plan() {
            self.discard = Some(discard);
            if let Some(byte) = self.lookahead.take() {
                if !self.swallow(byte) {
                    self.lookahead = Some(byte);
                }
            }
        }
        self.staging.reset();
    }

    /// Open a frame tagged with `tag`
    pub fn start_frame(&mut self, tag: u8) {
        let stx = self.encoder.start();
        self.write(&[stx]);
        self.send_frame_byte(tag);
    }

    pub fn send_frame_byte(&mut self, byte: u8) {
        let escaped = FrameEncoder::escape(byte);
        self.write(escaped.as_slice());
    }

    pub fn end_frame(&mut self) {
        let etx = self.encoder.end();
        self.write(&[etx]);
    }

    fn send_tagged(&mut self, command: Command, value: u8) {
        self.start_frame(command.opcode());
        self.send_frame_byte(value);
        self.end_frame();
    }

    pub fn send_device_select(&mut self, device: u8) {
        self.send_tagged(Command::DeviceSelect, device);
    }

    pub fn send_print_char(&mut self, data: u8) {
        self.send_tagged(Command::Print, data);
    }

    pub fn send_data_byte(&mut self, data: u8) {
        self.send_tagged(Command::Data, data);
    }

    /// Open the frame that carries a disk command; bytes follow live
    pub fn start_disk_command(&mut self) {
        self.start_frame(Command::Disk.opcode());
    }

    /// Answer a resynchronization request
    pub fn send_sync(&mut self) {
        self.write(&[SYN]);
    }

    /// Allow the host to send the next chunk
    pub fn send_credit(&mut self) {
        self.write(&[DC1]);
    }

    /// Declare the size of the next bulk payload
    pub fn initialize_buffer(&mut self, total: u16) -> Status<()> {
        self.staging.begin(total)
    }

    /// Move whatever the port has into the staging buffer without blocking
    ///
    /// Returns the number of payload bytes staged.
    pub fn fill_buffer(&mut self) -> usize {
        let mut staged = 0;
        while self.staging.wants_more() {
            let Some(raw) = self.poll_byte() else {
                break;
            };
            if self.staging.accept(raw) {
                staged += 1;
            }
        }
        staged
    }

    /// Next payload byte of the current transfer
    ///
    /// Staged bytes come first, then a latched fault, then `End` once the
    /// declared total has been delivered.
    pub fn read_buffer_byte(&mut self, timeout_ms: u32) -> Status<u8> {
        let start = self.clock.now_us();
        let limit_us = u64::from(timeout_ms) * 1000;
        loop {
            if let Some(byte) = self.staging.pop() {
                if self.staging.credit_due() {
                    self.send_credit();
                }
                return Ok(byte);
            }
            if let Some(fault) = self.staging.fault() {
                return Err(fault);
            }
            if self.staging.remaining() == 0 {
                return Err(ErrorKind::End);
            }
            if self.fill_buffer() > 0 || self.staging.fault().is_some() {
                continue;
            }
            if self.clock.elapsed_us(start) >= limit_us {
                return Err(ErrorKind::Timeout);
            }
            self.clock.delay_us(self.poll_interval_us);
        }
    }

    /// Check the checksum trailer and closing ETX, then release the buffer
    pub fn finish_transfer(&mut self) -> Status<()> {
        let result = self.check_trailer();
        if result.is_err() {
            self.abandon_transfer();
        } else {
            self.staging.reset();
        }
        result
    }

    /// One logical trailer byte, decoded with the payload's escape state
    fn read_trailer_byte(&mut self) -> Status<u8> {
        loop {
            let raw = self.wait_read_byte()?;
            if let Some(byte) = self.staging.feed_trailer(raw)? {
                return Ok(byte);
            }
        }
    }

    fn check_trailer(&mut self) -> Status<()> {
        if !self.staging.is_active() || self.staging.remaining() > 0 || !self.staging.is_empty() {
            return Err(ErrorKind::Unexpected);
        }
        let expected = self.staging.checksum();
        let received = match self.read_trailer_byte() {
            Ok(byte) => byte,
            // ETX where the checksum belongs
            Err(ErrorKind::End) => return Err(ErrorKind::SyncError),
            Err(kind) => return Err(kind),
        };
        match self.read_trailer_byte() {
            Err(ErrorKind::End) => {}
            Ok(_) => return Err(ErrorKind::Overflow),
            Err(kind) => return Err(kind),
        }
        if received != expected {
            return Err(ErrorKind::SyncError);
        }
        Ok(())
    }
}
