//! Command table
//!
//! One canonical table per protocol version. Opcodes double as the tag byte
//! of the frames the bridge sends back for that command.

use crate::ascii;

/// Protocol version reported by [`Command::Init`] as (major, minor)
pub const PROTOCOL_VERSION: (u8, u8) = (1, 1);

// Opcodes (host → bridge)
pub const OP_INIT: u8 = 0x01;
pub const OP_PING: u8 = 0x02;
pub const OP_DEVICE_SELECT: u8 = 0x03;
pub const OP_PRINT: u8 = 0x04;
pub const OP_DATA: u8 = 0x05;
pub const OP_LOAD_TAPE: u8 = 0x06;
pub const OP_SAVE_TAPE: u8 = 0x07;
pub const OP_DISK: u8 = 0x08;
pub const OP_CANCEL: u8 = ascii::CAN;

/// Host commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Report protocol version, buffer size and banner
    Init,
    /// Liveness check; no device interaction
    Ping,
    /// Compare the device-select lines against an expected device
    DeviceSelect,
    /// Receive one printer byte from the pocket computer
    Print,
    /// Drive one byte to the pocket computer
    Data,
    /// Play a host-supplied tape image to the pocket computer
    LoadTape,
    /// Record a tape image written by the pocket computer
    SaveTape,
    /// Bridge one disk command and its response
    Disk,
    /// Abandon the current command
    Cancel,
}

impl Command {
    /// Parse an opcode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            OP_INIT => Some(Command::Init),
            OP_PING => Some(Command::Ping),
            OP_DEVICE_SELECT => Some(Command::DeviceSelect),
            OP_PRINT => Some(Command::Print),
            OP_DATA => Some(Command::Data),
            OP_LOAD_TAPE => Some(Command::LoadTape),
            OP_SAVE_TAPE => Some(Command::SaveTape),
            OP_DISK => Some(Command::Disk),
            OP_CANCEL => Some(Command::Cancel),
            _ => None,
        }
    }

    /// Opcode byte, also used as the frame tag
    pub const fn opcode(self) -> u8 {
        match self {
            Command::Init => OP_INIT,
            Command::Ping => OP_PING,
            Command::DeviceSelect => OP_DEVICE_SELECT,
            Command::Print => OP_PRINT,
            Command::Data => OP_DATA,
            Command::LoadTape => OP_LOAD_TAPE,
            Command::SaveTape => OP_SAVE_TAPE,
            Command::Disk => OP_DISK,
            Command::Cancel => OP_CANCEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=u8::MAX {
            if let Some(command) = Command::from_byte(byte) {
                assert_eq!(command.opcode(), byte);
            }
        }
    }

    #[test]
    fn test_unknown_opcodes() {
        assert_eq!(Command::from_byte(0x00), None);
        assert_eq!(Command::from_byte(0x09), None);
        assert_eq!(Command::from_byte(ascii::SYN), None);
        assert_eq!(Command::from_byte(0xFF), None);
    }

    #[test]
    fn test_cancel_is_can() {
        assert_eq!(Command::from_byte(ascii::CAN), Some(Command::Cancel));
    }
}
