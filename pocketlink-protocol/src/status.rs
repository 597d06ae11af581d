//! Result model shared by every layer of the bridge
//!
//! A read or handshake either yields its payload or one [`ErrorKind`].
//! `End` is not a failure: it marks the boundary of a stream or frame.

/// Outcome of a read or handshake
pub type Status<T = u8> = Result<T, ErrorKind>;

/// Failure kinds, with their wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorKind {
    /// No response within the bound; the caller may retry
    Timeout = 1,
    /// Host abandoned the command
    Cancelled = 2,
    /// Protocol violation: unknown opcode, bad argument, mismatched echo
    Unexpected = 3,
    /// Declared transfer size or buffer capacity exceeded
    Overflow = 4,
    /// Handshake phase violation or corrupted data; bus needs re-arming
    SyncError = 5,
    /// End of stream or frame
    End = 0xFF,
}

impl ErrorKind {
    /// Wire code sent after `NAK`
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorKind::Timeout),
            2 => Some(ErrorKind::Cancelled),
            3 => Some(ErrorKind::Unexpected),
            4 => Some(ErrorKind::Overflow),
            5 => Some(ErrorKind::SyncError),
            0xFF => Some(ErrorKind::End),
            _ => None,
        }
    }

    /// True for the end-of-stream sentinel
    pub const fn is_end(self) -> bool {
        matches!(self, ErrorKind::End)
    }

    /// True if the device lines may be inconsistent after this failure
    pub const fn requires_bus_reset(self) -> bool {
        matches!(self, ErrorKind::SyncError)
    }
}
