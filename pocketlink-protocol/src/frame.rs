//! Frame encoding and decoding for the host link.
//!
//! Frame format:
//! - STX (1 byte): opens the frame
//! - PAYLOAD (0+ bytes): reserved bytes are sent as `DLE, byte`
//! - ETX (1 byte): closes the frame
//!
//! The encoder is byte-at-a-time so frames can be streamed while the device
//! is still producing data. The decoder is incremental for the same reason.

use heapless::Vec;

use crate::ascii::{self, CAN, DLE, ETX, STX};
use crate::status::ErrorKind;

/// Errors from the whole-frame helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// First byte was not STX
    MissingStart,
    /// Input ended before ETX
    Incomplete,
    /// Bytes follow the closing ETX
    TrailingData,
    /// Output buffer too small
    BufferTooSmall,
    /// CAN inside the frame
    Cancelled,
    /// Unescaped reserved byte inside the frame
    SyncError,
}

impl From<FrameError> for ErrorKind {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Cancelled => ErrorKind::Cancelled,
            FrameError::BufferTooSmall | FrameError::TrailingData => ErrorKind::Overflow,
            FrameError::MissingStart | FrameError::Incomplete | FrameError::SyncError => {
                ErrorKind::SyncError
            }
        }
    }
}

/// One payload byte in wire form: 1 byte, or 2 when escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escaped {
    bytes: [u8; 2],
    len: u8,
}

impl Escaped {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn is_escaped(&self) -> bool {
        self.len == 2
    }
}

/// Outbound framing state
#[derive(Debug, Clone, Default)]
pub struct FrameEncoder {
    open: bool,
}

impl FrameEncoder {
    pub const fn new() -> Self {
        Self { open: false }
    }

    /// Open a frame and return the STX to send
    ///
    /// Nested frames are a caller bug.
    pub fn start(&mut self) -> u8 {
        debug_assert!(!self.open, "frame started twice");
        self.open = true;
        STX
    }

    /// Wire form of one payload byte
    pub fn escape(byte: u8) -> Escaped {
        if ascii::is_reserved(byte) {
            Escaped {
                bytes: [DLE, byte],
                len: 2,
            }
        } else {
            Escaped {
                bytes: [byte, 0],
                len: 1,
            }
        }
    }

    /// Close the frame and return the ETX to send
    pub fn end(&mut self) -> u8 {
        debug_assert!(self.open, "frame ended without start");
        self.open = false;
        ETX
    }

    /// Drop the framing state without emitting ETX
    pub fn abort(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Inbound decoding state for the inside of one frame
///
/// The opening STX is consumed by the caller; `feed` sees everything after it.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    escaped: bool,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { escaped: false }
    }

    pub fn reset(&mut self) {
        self.escaped = false;
    }

    /// True while waiting for the byte after a DLE
    pub fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Feed one raw byte
    ///
    /// Returns `Ok(Some(byte))` for a literal, `Ok(None)` after a lone DLE,
    /// `Err(End)` on ETX, `Err(Cancelled)` on CAN and `Err(SyncError)` on any
    /// other unescaped reserved byte.
    pub fn feed(&mut self, raw: u8) -> Result<Option<u8>, ErrorKind> {
        if self.escaped {
            self.escaped = false;
            return Ok(Some(raw));
        }
        match raw {
            DLE => {
                self.escaped = true;
                Ok(None)
            }
            ETX => Err(ErrorKind::End),
            CAN => Err(ErrorKind::Cancelled),
            b if ascii::is_reserved(b) => Err(ErrorKind::SyncError),
            b => Ok(Some(b)),
        }
    }
}

/// Encode a whole frame into a heapless Vec
pub fn encode_frame<const N: usize>(payload: &[u8]) -> Result<Vec<u8, N>, FrameError> {
    let mut encoder = FrameEncoder::new();
    let mut out = Vec::new();
    out.push(encoder.start())
        .map_err(|_| FrameError::BufferTooSmall)?;
    for &byte in payload {
        out.extend_from_slice(FrameEncoder::escape(byte).as_slice())
            .map_err(|_| FrameError::BufferTooSmall)?;
    }
    out.push(encoder.end())
        .map_err(|_| FrameError::BufferTooSmall)?;
    Ok(out)
}

/// Decode exactly one whole frame
pub fn decode_frame<const N: usize>(raw: &[u8]) -> Result<Vec<u8, N>, FrameError> {
    let (&first, rest) = raw.split_first().ok_or(FrameError::Incomplete)?;
    if first != STX {
        return Err(FrameError::MissingStart);
    }

    let mut decoder = FrameDecoder::new();
    let mut out = Vec::new();
    for (i, &byte) in rest.iter().enumerate() {
        match decoder.feed(byte) {
            Ok(Some(value)) => out.push(value).map_err(|_| FrameError::BufferTooSmall)?,
            Ok(None) => {}
            Err(ErrorKind::End) => {
                if i + 1 != rest.len() {
                    return Err(FrameError::TrailingData);
                }
                return Ok(out);
            }
            Err(ErrorKind::Cancelled) => return Err(FrameError::Cancelled),
            Err(_) => return Err(FrameError::SyncError),
        }
    }
    Err(FrameError::Incomplete)
}
