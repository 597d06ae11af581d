//! PocketLink - Sharp Pocket Computer Peripheral Bridge
//!
//! Main firmware binary for RP2040-based bridge boards. The desktop host
//! talks framed serial on UART0; the pocket computer sees a tape deck,
//! printer and disk drive on its 11-pin bus.
//!
//! Pin map:
//!
//! | GPIO | Line | Direction      |
//! |------|------|----------------|
//! | 0    | TX   | to host        |
//! | 1    | RX   | from host      |
//! | 2    | BUSY | from computer  |
//! | 3    | DOUT | from computer  |
//! | 4    | XOUT | from computer  |
//! | 5    | SEL1 | from computer  |
//! | 6    | SEL2 | from computer  |
//! | 7    | ACK  | to computer    |
//! | 8    | DIN  | to computer    |
//! | 9    | XIN  | to computer    |
//! | 10   | BEEP | piezo          |

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::Pull;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pocketlink_core::device::{BusInputs, BusOutputs, SharpPins};
use pocketlink_core::dispatch::{Dispatcher, Report};
use pocketlink_hal_rp2040::{uart_config, HostUart, RpClock, RpInput, RpOutput};
use pocketlink_protocol::PROTOCOL_VERSION;

use crate::config::{BRIDGE_CONFIG, SERIAL_CONFIG};

mod config;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!(
        "PocketLink bridge starting (protocol {}.{})",
        PROTOCOL_VERSION.0,
        PROTOCOL_VERSION.1
    );

    let p = embassy_rp::init(Default::default());

    // Host UART
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config(&SERIAL_CONFIG));
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let serial = HostUart::new(uart);
    info!("Host UART at {} baud", SERIAL_CONFIG.baudrate);

    // Sharp bus
    let inputs = BusInputs {
        busy: RpInput::new(p.PIN_2.into(), Pull::Down),
        dout: RpInput::new(p.PIN_3.into(), Pull::Down),
        xout: RpInput::new(p.PIN_4.into(), Pull::Down),
        sel1: RpInput::new(p.PIN_5.into(), Pull::Down),
        sel2: RpInput::new(p.PIN_6.into(), Pull::Down),
    };
    let outputs = BusOutputs {
        ack: RpOutput::new(p.PIN_7.into()),
        din: RpOutput::new(p.PIN_8.into()),
        xin: RpOutput::new(p.PIN_9.into()),
        beep: RpOutput::new(p.PIN_10.into()),
    };
    let bus = SharpPins::new(inputs, outputs);

    let mut dispatcher = Dispatcher::new(serial, bus, RpClock, BRIDGE_CONFIG);
    info!("Bridge ready: {}", BRIDGE_CONFIG);

    let mut tx_faults = 0;
    loop {
        match dispatcher.task() {
            Some(Report::Handled {
                command,
                result: Err(kind),
            }) => warn!("{} failed: {}", command, kind),
            Some(report) => debug!("{}", report),
            None => {}
        }

        let faults = dispatcher.host().tx_faults();
        if faults != tx_faults {
            warn!("Host TX faults: {}", faults);
            tx_faults = faults;
        }

        // Let the time driver and RTT run between commands
        embassy_futures::yield_now().await;
    }
}
