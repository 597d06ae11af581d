//! Command Dispatcher
//!
//! Reads one opcode from the host, runs its handler against the Device Link
//! and answers with exactly one acknowledgement. This is the only place that
//! turns a failed [`Status`] into a failure on the wire.

use pocketlink_hal::{Clock, Serial};
use pocketlink_protocol::ascii::{CAN, STX, SYN};
use pocketlink_protocol::{Command, ErrorKind, Status, PROTOCOL_VERSION};

use crate::config::BridgeConfig;
use crate::device::{DeviceLink, Phase};
use crate::host::{HostLink, BUFFER_SIZE};
use crate::traits::SharpBus;

/// Banner reported by `Init`
pub const BANNER: &[u8] = b"PocketLink bridge";

/// Highest device number on the select lines
const MAX_DEVICE: u8 = 3;

/// Beeper periods sounded after a bus fault
const FAULT_BEEP_CYCLES: u16 = 200;

/// Disk response flag: the exchange ends with this response
pub const DISK_RELEASE: u8 = 0x00;
/// Disk response flag: another disk command follows right away
pub const DISK_CAPTURE: u8 = 0xFF;

/// What one dispatcher iteration did, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    /// SYN echoed back
    Synchronized,
    /// Unknown opcode answered with `Unexpected`
    Rejected { opcode: u8 },
    /// A command ran and was acknowledged
    Handled {
        command: Command,
        result: Status<()>,
    },
}

/// Protocol state machine between the host and the pocket computer
pub struct Dispatcher<S, B, C> {
    host: HostLink<S, C>,
    device: DeviceLink<B, C>,
    config: BridgeConfig,
}

impl<S, B, C> Dispatcher<S, B, C>
where
    S: Serial,
    B: SharpBus,
    C: Clock + Clone,
{
    pub fn new(serial: S, bus: B, clock: C, config: BridgeConfig) -> Self {
        Self {
            host: HostLink::new(serial, clock.clone(), &config.timing),
            device: DeviceLink::new(bus, clock, config.timing),
            config,
        }
    }

    pub fn host(&self) -> &HostLink<S, C> {
        &self.host
    }

    pub fn device(&self) -> &DeviceLink<B, C> {
        &self.device
    }

    /// Run one command if an opcode is waiting
    pub fn task(&mut self) -> Option<Report> {
        let opcode = self.host.poll_byte()?;
        Some(self.process_command(opcode))
    }

    /// Run the command for `opcode` and acknowledge it
    pub fn process_command(&mut self, opcode: u8) -> Report {
        if opcode == SYN {
            self.host.send_sync();
            return Report::Synchronized;
        }
        let Some(command) = Command::from_byte(opcode) else {
            self.host.send_failure(ErrorKind::Unexpected);
            return Report::Rejected { opcode };
        };

        let result = match command {
            Command::Init => self.init(),
            Command::Ping => Ok(()),
            Command::DeviceSelect => self.device_select(),
            Command::Print => self.print(),
            Command::Data => self.data(),
            Command::LoadTape => self.load_tape(),
            Command::SaveTape => self.save_tape(),
            Command::Disk => self.disk(),
            Command::Cancel => Err(ErrorKind::Cancelled),
        };

        match result {
            Ok(()) => self.host.send_success(),
            Err(kind) => self.fail(kind),
        }
        Report::Handled { command, result }
    }

    fn fail(&mut self, kind: ErrorKind) {
        // End is a loop boundary; reaching here means a handler leaked it
        let kind = if kind.is_end() {
            ErrorKind::Unexpected
        } else {
            kind
        };
        self.host.send_failure(kind);

        if kind.requires_bus_reset() || self.device.phase() != Phase::Idle {
            self.device.reset();
            if self.config.beep_on_fault {
                self.device.beep(FAULT_BEEP_CYCLES);
            }
        }
    }

    fn init(&mut self) -> Status<()> {
        let (major, minor) = PROTOCOL_VERSION;
        self.host.start_frame(Command::Init.opcode());
        self.host.send_frame_byte(major);
        self.host.send_frame_byte(minor);
        self.host.send_frame_byte(BUFFER_SIZE as u8);
        for &b in BANNER {
            self.host.send_frame_byte(b);
        }
        self.host.end_frame();
        Ok(())
    }

    fn device_select(&mut self) -> Status<()> {
        let expected = self.host.wait_read_byte()?;
        if expected > MAX_DEVICE {
            return Err(ErrorKind::Unexpected);
        }
        let current = self.device.read_device_select()?;
        self.host.send_device_select(current);
        if current == expected {
            Ok(())
        } else {
            Err(ErrorKind::Unexpected)
        }
    }

    fn print(&mut self) -> Status<()> {
        let c = self.device.read_print_byte()?;
        self.host.send_print_char(c);
        Ok(())
    }

    fn data(&mut self) -> Status<()> {
        let value = self.host.wait_read_byte()?;
        self.device.send_disk_byte(value)
    }

    fn load_tape(&mut self) -> Status<()> {
        let len = self.host.wait_read_word()?;
        self.host.expect(STX)?;
        self.host.initialize_buffer(len)?;

        self.device.begin_tape_write();
        let streamed = self.stream_staged(|device, byte| {
            device.write_tape_byte(byte);
            Ok(())
        });
        self.device.end_tape_write();
        streamed?;

        self.host.finish_transfer()
    }

    fn save_tape(&mut self) -> Status<()> {
        let host = &mut self.host;
        self.device
            .begin_tape_read(self.config.timing.tape_start_timeout_ms, || {
                host.read_cancel()
            })?;
        loop {
            let host = &mut self.host;
            match self.device.read_tape_byte(|| host.read_cancel()) {
                Ok(byte) => self.host.send_data_byte(byte),
                Err(ErrorKind::End) => return Ok(()),
                Err(kind) => return Err(kind),
            }
        }
    }

    /// Bridge disk commands until the host releases the drive
    fn disk(&mut self) -> Status<()> {
        loop {
            let capture = self.disk_exchange()?;
            if !capture {
                return Ok(());
            }
        }
    }

    /// One disk command out and its response in; true if the host captures
    /// the next command as well
    fn disk_exchange(&mut self) -> Status<bool> {
        let timing = self.config.timing;
        let host = &mut self.host;
        self.device
            .wait_transfer_start(timing.disk_command_timeout_ms, || host.read_cancel())?;

        self.host.start_disk_command();
        let host = &mut self.host;
        self.device.process_disk_command(|byte| {
            host.send_frame_byte(byte);
            if host.read_cancel() {
                Err(ErrorKind::Cancelled)
            } else {
                Ok(())
            }
        })?;
        self.host.end_frame();

        let capture = match self
            .host
            .wait_read_byte_within(timing.host_response_timeout_ms)?
        {
            DISK_RELEASE => false,
            DISK_CAPTURE => true,
            CAN => return Err(ErrorKind::Cancelled),
            _ => return Err(ErrorKind::Unexpected),
        };
        let len = self.host.wait_read_word()?;
        if len > 0 {
            self.host.expect(STX)?;
            self.host.initialize_buffer(len)?;
            self.stream_staged(|device, byte| device.send_disk_byte(byte))?;
            self.host.finish_transfer()?;
        }
        Ok(capture)
    }

    /// Feed every staged payload byte to the device until the transfer ends
    fn stream_staged<F>(&mut self, mut sink: F) -> Status<()>
    where
        F: FnMut(&mut DeviceLink<B, C>, u8) -> Status<()>,
    {
        let timeout_ms = self.config.timing.host_byte_timeout_ms;
        loop {
            match self.host.read_buffer_byte(timeout_ms) {
                Ok(byte) => sink(&mut self.device, byte)?,
                Err(ErrorKind::End) => return Ok(()),
                Err(kind) => return Err(kind),
            }
        }
    }
}
