//! GPIO wrappers
//!
//! Newtypes over the embassy pin drivers so the shared HAL traits can be
//! implemented for them.

use embassy_rp::gpio::{AnyPin, Input, Level, Output, Pull};
use embassy_rp::Peri;
use pocketlink_hal::{InputPin, OutputPin};

/// Bus line sampled by the bridge
pub struct RpInput {
    pin: Input<'static>,
}

impl RpInput {
    pub fn new(pin: Peri<'static, AnyPin>, pull: Pull) -> Self {
        Self {
            pin: Input::new(pin, pull),
        }
    }
}

impl InputPin for RpInput {
    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Bus line driven by the bridge; starts low
pub struct RpOutput {
    pin: Output<'static>,
}

impl RpOutput {
    pub fn new(pin: Peri<'static, AnyPin>) -> Self {
        Self {
            pin: Output::new(pin, Level::Low),
        }
    }
}

impl OutputPin for RpOutput {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}
