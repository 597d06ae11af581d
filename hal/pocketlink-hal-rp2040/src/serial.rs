//! Host serial port
//!
//! Wraps a buffered UART. The interrupt handler fills the RX ring in the
//! background; the dispatcher drains it one byte at a time without blocking.

use embassy_rp::uart::{self, BufferedUart};
use embedded_io::{Read, ReadReady, Write};
use pocketlink_hal::serial::{DataBits, Parity, SerialConfig, StopBits};
use pocketlink_hal::{SerialRx, SerialTx};

/// UART line errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    Overrun,
    Break,
    Parity,
    Framing,
    Other,
}

impl From<uart::Error> for SerialError {
    fn from(err: uart::Error) -> Self {
        match err {
            uart::Error::Overrun => SerialError::Overrun,
            uart::Error::Break => SerialError::Break,
            uart::Error::Parity => SerialError::Parity,
            uart::Error::Framing => SerialError::Framing,
            _ => SerialError::Other,
        }
    }
}

/// Translate the shared line settings into an embassy UART config
pub fn uart_config(config: &SerialConfig) -> uart::Config {
    let mut cfg = uart::Config::default();
    cfg.baudrate = config.baudrate;
    cfg.data_bits = match config.data_bits {
        DataBits::Seven => uart::DataBits::DataBits7,
        DataBits::Eight => uart::DataBits::DataBits8,
    };
    cfg.parity = match config.parity {
        Parity::None => uart::Parity::ParityNone,
        Parity::Even => uart::Parity::ParityEven,
        Parity::Odd => uart::Parity::ParityOdd,
    };
    cfg.stop_bits = match config.stop_bits {
        StopBits::One => uart::StopBits::STOP1,
        StopBits::Two => uart::StopBits::STOP2,
    };
    cfg
}

/// UART connected to the desktop host
pub struct HostUart {
    uart: BufferedUart,
}

impl HostUart {
    pub fn new(uart: BufferedUart) -> Self {
        Self { uart }
    }
}

impl SerialTx for HostUart {
    type Error = SerialError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.uart.write_all(data).map_err(SerialError::from)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Write::flush(&mut self.uart).map_err(SerialError::from)
    }
}

impl SerialRx for HostUart {
    type Error = SerialError;

    fn try_read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        if !self.uart.read_ready()? {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}
