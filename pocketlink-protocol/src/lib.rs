//! PocketLink Host Protocol
//!
//! This crate defines the serial protocol between the desktop host and the
//! bridge. Requests from the host are raw opcode bytes followed by their
//! arguments; everything else travels in escaped frames.
//!
//! # Protocol Overview
//!
//! ```text
//! host → bridge   OPCODE [ARG...]
//!                 STX ESCAPED-PAYLOAD... ESCAPED-CHECKSUM ETX   (bulk data)
//!                 CAN                                          (cancel)
//!                 SYN                                          (resync)
//!
//! bridge → host   STX TAG ESCAPED-PAYLOAD... ETX               (data frame)
//!                 ACK | NAK CODE                               (one per command)
//!                 DC1                                          (flow credit)
//! ```
//!
//! Any payload byte that collides with a control value is sent as
//! `DLE, byte`. An unescaped control byte inside a frame is a
//! synchronization fault.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod ascii;
pub mod checksum;
pub mod command;
pub mod frame;
pub mod status;

pub use checksum::Checksum;
pub use command::{Command, PROTOCOL_VERSION};
pub use frame::{decode_frame, encode_frame, Escaped, FrameDecoder, FrameEncoder, FrameError};
pub use status::{ErrorKind, Status};
