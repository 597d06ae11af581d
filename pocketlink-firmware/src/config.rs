//! Settings baked in from bridge.toml by the build script

use pocketlink_core::config::{BridgeConfig, TimingConfig};
use pocketlink_hal::serial::{DataBits, Parity, SerialConfig, StopBits};

include!(concat!(env!("OUT_DIR"), "/bridge_config.rs"));
