//! Sharp pocket computer bus lines
//!
//! Line names follow the pocket computer's 11-pin connector, seen from the
//! bridge: the computer drives the inputs and the bridge drives the outputs.

/// Lines the bridge samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputLine {
    /// Bit strobe from the computer
    Busy,
    /// Serial data from the computer
    Dout,
    /// Tape output from the computer; also marks an active disk command
    Xout,
    /// Device select, bit 0
    Sel1,
    /// Device select, bit 1
    Sel2,
}

/// Lines the bridge drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputLine {
    /// Bit acknowledge to the computer
    Ack,
    /// Serial data to the computer
    Din,
    /// Tape input to the computer
    Xin,
    /// Piezo beeper
    Beep,
}

/// Capability object for the bus
///
/// The Device Link owns exactly one of these. Tests substitute a simulated
/// pocket computer.
pub trait SharpBus {
    /// Read the current level of an input line
    fn sample(&mut self, line: InputLine) -> bool;

    /// Drive an output line
    fn drive(&mut self, line: OutputLine, high: bool);
}
