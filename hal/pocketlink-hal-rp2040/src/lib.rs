//! RP2040-specific HAL for the PocketLink bridge
//!
//! This crate provides RP2040 implementations of the shared
//! `pocketlink-hal` traits:
//!
//! - GPIO input/output wrappers for the Sharp bus lines
//! - Buffered UART host port with non-blocking reads
//! - Microsecond clock on top of the embassy time driver

#![no_std]

pub mod clock;
pub mod gpio;
pub mod serial;

pub use clock::RpClock;
pub use gpio::{RpInput, RpOutput};
pub use serial::{uart_config, HostUart, SerialError};
