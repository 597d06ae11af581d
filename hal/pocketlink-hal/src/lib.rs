//! PocketLink Hardware Abstraction Layer
//!
//! This crate defines hardware abstraction traits that can be implemented
//! by chip-specific HALs. The bridge logic in `pocketlink-core` only talks
//! to these traits, so it runs unchanged on real silicon and against the
//! simulated pocket computer used by the tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (pocketlink-firmware)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pocketlink-core (dispatcher, links)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pocketlink-hal (this crate - traits)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ pocketlink-   │
//!             │  hal-rp2040   │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O for the bus lines
//! - [`serial::SerialRx`], [`serial::SerialTx`] - Host serial link
//! - [`clock::Clock`] - Monotonic time and busy-wait delays

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod gpio;
pub mod serial;

// Re-export key traits at crate root for convenience
pub use clock::Clock;
pub use gpio::{InputPin, OutputPin};
pub use serial::{Serial, SerialRx, SerialTx};
