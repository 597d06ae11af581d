//! Board-agnostic core logic for the PocketLink bridge
//!
//! This crate contains everything that does not depend on a specific chip:
//!
//! - Bridge configuration and its timing contract
//! - The `SharpBus` capability trait for the pocket computer's bus lines
//! - Host Link: timeout-aware reads, frame sends, staged bulk transfers
//! - Device Link: bit-level handshakes, disk bridging, tape tones, beeper
//! - Command Dispatcher: one opcode in, one acknowledgement out

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod device;
pub mod dispatch;
pub mod host;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;
