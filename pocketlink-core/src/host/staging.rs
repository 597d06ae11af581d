//! Staging buffer for bulk transfers from the host
//!
//! Holds decoded payload bytes between the serial port and the dispatcher.
//! Tracks how much of the declared transfer is still on the wire so a
//! transfer can never grow past what was announced.

use heapless::Deque;
use pocketlink_protocol::{Checksum, ErrorKind, FrameDecoder, Status};

/// Decoded bytes held at once; also the flow-control chunk size
pub const BUFFER_SIZE: usize = 64;

/// Bounded holding area for one declared transfer
#[derive(Debug)]
pub struct StagingBuffer {
    data: Deque<u8, BUFFER_SIZE>,
    active: bool,
    /// Bytes of the transfer not yet pulled from the wire
    remaining: u16,
    /// Bytes handed to the consumer since `begin`
    delivered: u32,
    checksum: Checksum,
    decoder: FrameDecoder,
    fault: Option<ErrorKind>,
    /// The host's closing ETX (or a CAN) has been consumed
    closed: bool,
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingBuffer {
    pub const fn new() -> Self {
        Self {
            data: Deque::new(),
            active: false,
            remaining: 0,
            delivered: 0,
            checksum: Checksum::new(),
            decoder: FrameDecoder::new(),
            fault: None,
            closed: false,
        }
    }

    /// Drop any transfer in progress
    pub fn reset(&mut self) {
        self.data.clear();
        self.active = false;
        self.remaining = 0;
        self.delivered = 0;
        self.checksum = Checksum::new();
        self.decoder.reset();
        self.fault = None;
        self.closed = false;
    }

    /// Declare a new transfer of `total` bytes
    pub fn begin(&mut self, total: u16) -> Status<()> {
        if self.active {
            return Err(ErrorKind::Overflow);
        }
        self.reset();
        self.active = true;
        self.remaining = total;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn fault(&self) -> Option<ErrorKind> {
        self.fault
    }

    /// Sum of every payload byte decoded so far
    pub fn checksum(&self) -> u8 {
        self.checksum.value()
    }

    /// True while another raw byte may be taken from the wire
    pub fn wants_more(&self) -> bool {
        self.active && self.fault.is_none() && self.remaining > 0 && !self.data.is_full()
    }

    /// Decode one raw byte into the buffer
    ///
    /// Returns true if a payload byte was staged. Control bytes latch a
    /// fault that surfaces after the bytes already staged.
    pub fn accept(&mut self, raw: u8) -> bool {
        if !self.wants_more() {
            return false;
        }
        match self.decoder.feed(raw) {
            Ok(Some(byte)) => {
                if self.data.push_back(byte).is_err() {
                    self.fault = Some(ErrorKind::Overflow);
                    return false;
                }
                self.checksum.update(byte);
                self.remaining -= 1;
                true
            }
            Ok(None) => false,
            // ETX before the declared length: the payload was truncated
            Err(ErrorKind::End) => {
                self.closed = true;
                self.fault = Some(ErrorKind::SyncError);
                false
            }
            Err(kind) => {
                self.closed = kind == ErrorKind::Cancelled;
                self.fault = Some(kind);
                false
            }
        }
    }

    /// Decode one raw byte of the checksum trailer
    ///
    /// Same results as [`FrameDecoder::feed`]; the escape state carries over
    /// from the payload.
    pub fn feed_trailer(&mut self, raw: u8) -> Result<Option<u8>, ErrorKind> {
        let result = self.decoder.feed(raw);
        if matches!(result, Err(ErrorKind::End | ErrorKind::Cancelled)) {
            self.closed = true;
        }
        result
    }

    /// What is left of the host's frame if the transfer is dropped now
    ///
    /// The host never sends past the last credit it was given, so only the
    /// rest of the current chunk can still arrive. The trailer follows only
    /// when that chunk is the last one.
    pub fn discard_plan(&self) -> Option<Discard> {
        if !self.active || self.closed {
            return None;
        }
        let pulled = self.delivered + self.data.len() as u32;
        let total = pulled + u32::from(self.remaining);
        let chunk = BUFFER_SIZE as u32;
        let window_end = total.min((self.delivered / chunk + 1) * chunk);
        let trailer = window_end == total;
        let payload_left = window_end.saturating_sub(pulled);
        if !trailer && payload_left == 0 {
            return None;
        }
        Some(Discard {
            decoder: self.decoder.clone(),
            payload_left,
            trailer,
        })
    }

    /// Take the next staged byte
    pub fn pop(&mut self) -> Option<u8> {
        let byte = self.data.pop_front()?;
        self.delivered += 1;
        Some(byte)
    }

    /// True right after a full chunk was delivered and more is expected
    pub fn credit_due(&self) -> bool {
        self.remaining > 0 && self.delivered > 0 && self.delivered % BUFFER_SIZE as u32 == 0
    }
}

/// Remainder of an abandoned host frame, skipped byte by byte
#[derive(Debug, Clone)]
pub struct Discard {
    decoder: FrameDecoder,
    payload_left: u32,
    /// Checksum and ETX are still to come
    trailer: bool,
}

impl Discard {
    /// True while the byte after a DLE is pending
    pub fn is_escaped(&self) -> bool {
        self.decoder.is_escaped()
    }

    pub fn payload_left(&self) -> u32 {
        self.payload_left
    }

    pub fn expects_trailer(&self) -> bool {
        self.trailer
    }

    /// Swallow one raw byte; true once the frame is fully skipped
    pub fn feed(&mut self, raw: u8) -> bool {
        match self.decoder.feed(raw) {
            Ok(Some(_)) => {
                self.payload_left = self.payload_left.saturating_sub(1);
                !self.trailer && self.payload_left == 0
            }
            Ok(None) => false,
            Err(ErrorKind::End | ErrorKind::Cancelled) => true,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketlink_protocol::ascii::{CAN, DLE, ETX, STX};

    #[test]
    fn test_begin_while_active_overflows() {
        let mut buf = StagingBuffer::new();
        assert_eq!(buf.begin(4), Ok(()));
        assert_eq!(buf.begin(4), Err(ErrorKind::Overflow));
        buf.reset();
        assert_eq!(buf.begin(0), Ok(()));
    }

    #[test]
    fn test_never_exceeds_declared_total() {
        let mut buf = StagingBuffer::new();
        buf.begin(2).unwrap();
        assert!(buf.accept(b'a'));
        assert!(buf.accept(b'b'));
        assert!(!buf.accept(b'c'));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_capacity_bound() {
        let mut buf = StagingBuffer::new();
        buf.begin(200).unwrap();
        let accepted = (0..100).filter(|_| buf.accept(0x41)).count();
        assert_eq!(accepted, BUFFER_SIZE);
        assert!(!buf.wants_more());
        assert_eq!(buf.remaining(), 200 - BUFFER_SIZE as u16);
    }

    #[test]
    fn test_escaped_bytes_and_checksum() {
        let mut buf = StagingBuffer::new();
        buf.begin(2).unwrap();
        assert!(!buf.accept(DLE));
        assert!(buf.accept(ETX));
        assert!(buf.accept(0xFE));
        assert_eq!(buf.checksum(), ETX.wrapping_add(0xFE));
        assert_eq!(buf.pop(), Some(ETX));
        assert_eq!(buf.pop(), Some(0xFE));
        assert_eq!(buf.delivered(), 2);
    }

    #[test]
    fn test_control_bytes_latch_faults() {
        let mut buf = StagingBuffer::new();
        buf.begin(4).unwrap();
        assert!(buf.accept(b'x'));
        assert!(!buf.accept(ETX));
        assert_eq!(buf.fault(), Some(ErrorKind::SyncError));
        // Staged data is still there
        assert_eq!(buf.pop(), Some(b'x'));

        buf.reset();
        buf.begin(4).unwrap();
        buf.accept(CAN);
        assert_eq!(buf.fault(), Some(ErrorKind::Cancelled));

        buf.reset();
        buf.begin(4).unwrap();
        buf.accept(STX);
        assert_eq!(buf.fault(), Some(ErrorKind::SyncError));
    }

    #[test]
    fn test_credit_due_after_each_chunk() {
        let mut buf = StagingBuffer::new();
        buf.begin(BUFFER_SIZE as u16 + 1).unwrap();
        for _ in 0..BUFFER_SIZE {
            buf.accept(0x20);
        }
        for _ in 0..BUFFER_SIZE - 1 {
            buf.pop();
            assert!(!buf.credit_due());
        }
        buf.pop();
        assert!(buf.credit_due());
    }

    #[test]
    fn test_discard_plan_last_chunk_waits_for_etx() {
        let mut buf = StagingBuffer::new();
        buf.begin(4).unwrap();
        buf.accept(b'a');
        buf.accept(b'b');
        assert_eq!(buf.pop(), Some(b'a'));

        let mut discard = buf.discard_plan().unwrap();
        assert!(discard.expects_trailer());
        assert_eq!(discard.payload_left(), 2);
        // Payload, an escaped checksum, then ETX
        for raw in [b'c', b'd', DLE, ETX] {
            assert!(!discard.feed(raw));
        }
        assert!(discard.feed(ETX));
    }

    #[test]
    fn test_discard_plan_stops_at_credit_window() {
        let mut buf = StagingBuffer::new();
        buf.begin(200).unwrap();
        for _ in 0..BUFFER_SIZE {
            buf.accept(0x41);
        }
        while buf.pop().is_some() {}
        for _ in 0..10 {
            buf.accept(0x42);
        }

        // One credit sent: the host may send up to byte 128, no trailer
        let mut discard = buf.discard_plan().unwrap();
        assert!(!discard.expects_trailer());
        assert_eq!(discard.payload_left(), 2 * BUFFER_SIZE as u32 - 74);
        for _ in 0..discard.payload_left() - 1 {
            assert!(!discard.feed(0x43));
        }
        assert!(discard.feed(0x43));
    }

    #[test]
    fn test_discard_plan_keeps_escape_state() {
        let mut buf = StagingBuffer::new();
        buf.begin(3).unwrap();
        buf.accept(b'a');
        buf.accept(DLE);

        let mut discard = buf.discard_plan().unwrap();
        assert!(discard.is_escaped());
        // Escaped ETX is payload, not the end of the frame
        assert!(!discard.feed(ETX));
        assert!(discard.feed(ETX));
    }

    #[test]
    fn test_no_discard_after_frame_closed() {
        let mut buf = StagingBuffer::new();
        buf.begin(4).unwrap();
        buf.accept(b'x');
        buf.accept(ETX);
        assert!(buf.discard_plan().is_none());

        buf.reset();
        buf.begin(4).unwrap();
        buf.accept(CAN);
        assert!(buf.discard_plan().is_none());

        buf.reset();
        assert!(buf.discard_plan().is_none());
    }
}
