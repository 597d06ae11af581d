//! Bulk payload checksum
//!
//! 8-bit additive sum of every payload byte, carried after the payload of a
//! host → bridge bulk transfer.

/// Running additive checksum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Checksum(u8);

impl Checksum {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Add one byte
    pub fn update(&mut self, byte: u8) {
        self.0 = self.0.wrapping_add(byte);
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Checksum of a whole slice
    pub fn of(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
    }
}
