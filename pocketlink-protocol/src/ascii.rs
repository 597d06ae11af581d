//! ASCII control bytes used on the host link

/// Start of heading
pub const SOH: u8 = 0x01;
/// Start of text: opens a frame
pub const STX: u8 = 0x02;
/// End of text: closes a frame
pub const ETX: u8 = 0x03;
/// Acknowledge: command succeeded
pub const ACK: u8 = 0x06;
/// Data link escape: next byte is literal
pub const DLE: u8 = 0x10;
/// Device control 1 (XON): flow-control credit
pub const DC1: u8 = 0x11;
/// Negative acknowledge: command failed, error code follows
pub const NAK: u8 = 0x15;
/// Synchronous idle: link resynchronization
pub const SYN: u8 = 0x16;
/// Cancel the running command
pub const CAN: u8 = 0x18;

/// Every byte with a protocol meaning. These never appear unescaped
/// inside a frame.
pub const RESERVED: [u8; 9] = [SOH, STX, ETX, ACK, DLE, DC1, NAK, SYN, CAN];

/// Check whether a payload byte must be escaped
pub const fn is_reserved(byte: u8) -> bool {
    matches!(byte, SOH | STX | ETX | ACK | DLE | DC1 | NAK | SYN | CAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_table_matches_predicate() {
        for byte in 0..=u8::MAX {
            assert_eq!(is_reserved(byte), RESERVED.contains(&byte), "byte {byte:#04x}");
        }
    }
}
