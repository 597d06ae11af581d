//! Configuration types
//!
//! Board-agnostic bridge configuration. The firmware bakes a validated
//! instance in at build time from `bridge.toml`.

pub mod timing;

pub use timing::*;
