//! Simulated clock, serial port and pocket computer for unit tests
//!
//! All three share state through `Rc` so a test can keep a handle after
//! moving a clone into the code under test.

use std::cell::{Cell, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

use pocketlink_hal::{Clock, SerialRx, SerialTx};

use crate::traits::{InputLine, OutputLine, SharpBus};

/// Time consumed by every clock read
const TICK_US: u64 = 1;

/// Simulated monotonic clock
#[derive(Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time without consuming a tick
    pub fn peek(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + TICK_US);
        t
    }

    fn delay_us(&self, us: u32) {
        self.advance(u64::from(us));
    }
}

#[derive(Default)]
struct SerialState {
    /// Bytes from the host with the time they become readable
    rx: VecDeque<(u64, u8)>,
    tx: Vec<u8>,
    tx_failing: bool,
}

/// Simulated host serial port
#[derive(Clone)]
pub struct SimSerial {
    clock: SimClock,
    state: Rc<RefCell<SerialState>>,
}

impl SimSerial {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            state: Rc::default(),
        }
    }

    /// Queue host bytes that are readable immediately
    pub fn push_rx(&self, bytes: &[u8]) {
        self.push_rx_at(0, bytes);
    }

    /// Queue host bytes that become readable at `at_us`
    pub fn push_rx_at(&self, at_us: u64, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.rx.extend(bytes.iter().map(|&b| (at_us, b)));
    }

    pub fn rx_pending(&self) -> usize {
        self.state.borrow().rx.len()
    }

    /// Everything the bridge sent, draining the log
    pub fn take_tx(&self) -> Vec<u8> {
        core::mem::take(&mut self.state.borrow_mut().tx)
    }

    pub fn set_tx_failing(&self, failing: bool) {
        self.state.borrow_mut().tx_failing = failing;
    }
}

impl SerialTx for SimSerial {
    type Error = ();

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        if state.tx_failing {
            return Err(());
        }
        state.tx.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

impl SerialRx for SimSerial {
    type Error = ();

    fn try_read_byte(&mut self) -> Result<Option<u8>, ()> {
        let now = self.clock.peek();
        let mut state = self.state.borrow_mut();
        match state.rx.front() {
            Some(&(at, byte)) if at <= now => {
                state.rx.pop_front();
                Ok(Some(byte))
            }
            _ => Ok(None),
        }
    }
}

/// Which side drives the data line for the bit in flight
#[derive(Clone, Copy, PartialEq, Eq)]
enum BitRole {
    Talk,
    Listen,
}

/// Pocket computer model
///
/// Responds to ACK edges immediately: on a rising edge it raises BUSY and
/// either presents the next outgoing bit on DOUT or latches DIN.
pub struct BusState {
    /// Value on the select lines
    pub select: u8,
    /// Reacts to ACK at all
    pub responsive: bool,
    /// BUSY held high regardless of the handshake
    pub busy_stuck: bool,
    /// Bytes the computer sends (printer output or disk command)
    pub talk: VecDeque<u8>,
    /// Hold XOUT high while `talk` has bytes
    pub disk_command: bool,
    /// Further disk commands, each raised after XOUT has been seen low
    pub queued_commands: VecDeque<Vec<u8>>,
    /// Stop answering ACK once this many bytes were received
    pub silent_after: Option<usize>,
    /// Bytes the computer received from the bridge
    pub received: Vec<u8>,
    /// Tape signal on XOUT as absolute toggle times
    pub xout_edges: Vec<u64>,
    pub ack: bool,
    pub din: bool,
    pub xin: bool,
    pub beep: bool,
    pub beep_pulses: u32,
    /// Every XIN drive with its time
    pub xin_log: Vec<(u64, bool)>,
    busy: bool,
    dout: bool,
    role: Option<BitRole>,
    talk_bit: u8,
    talk_current: Option<u8>,
    listen_bit: u8,
    listen_value: u8,
    xout_cursor: usize,
    xout_low_seen: bool,
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            select: 0,
            responsive: true,
            busy_stuck: false,
            talk: VecDeque::new(),
            disk_command: false,
            queued_commands: VecDeque::new(),
            silent_after: None,
            received: Vec::new(),
            xout_edges: Vec::new(),
            ack: false,
            din: false,
            xin: false,
            beep: false,
            beep_pulses: 0,
            xin_log: Vec::new(),
            busy: false,
            dout: false,
            role: None,
            talk_bit: 0,
            talk_current: None,
            listen_bit: 0,
            listen_value: 0,
            xout_cursor: 0,
            xout_low_seen: false,
        }
    }
}

impl BusState {
    fn talking(&self) -> bool {
        self.talk_current.is_some() || !self.talk.is_empty()
    }

    fn ack_rising(&mut self) {
        if self.talking() {
            let byte = match self.talk_current {
                Some(b) => b,
                None => {
                    let b = self.talk.pop_front().unwrap_or(0);
                    self.talk_current = Some(b);
                    b
                }
            };
            self.dout = byte & (1 << self.talk_bit) != 0;
            self.role = Some(BitRole::Talk);
        } else {
            if self.din {
                self.listen_value |= 1 << self.listen_bit;
            }
            self.role = Some(BitRole::Listen);
        }
        self.busy = true;
    }

    fn ack_falling(&mut self) {
        match self.role.take() {
            Some(BitRole::Talk) => {
                self.talk_bit += 1;
                if self.talk_bit == 8 {
                    self.talk_bit = 0;
                    self.talk_current = None;
                }
            }
            Some(BitRole::Listen) => {
                self.listen_bit += 1;
                if self.listen_bit == 8 {
                    self.received.push(self.listen_value);
                    self.listen_bit = 0;
                    self.listen_value = 0;
                    if self.silent_after == Some(self.received.len()) {
                        self.responsive = false;
                    }
                }
            }
            None => {}
        }
        self.busy = false;
    }

    fn xout(&mut self, now: u64) -> bool {
        if self.xout_edges.is_empty() {
            if !self.talking() {
                if !self.xout_low_seen {
                    self.xout_low_seen = true;
                } else if let Some(command) = self.queued_commands.pop_front() {
                    self.talk.extend(command);
                    self.xout_low_seen = false;
                }
            }
            return self.disk_command && self.talking();
        }
        while self.xout_cursor < self.xout_edges.len() && self.xout_edges[self.xout_cursor] <= now {
            self.xout_cursor += 1;
        }
        self.xout_cursor % 2 == 1
    }
}

/// Simulated pocket computer on the bus
#[derive(Clone)]
pub struct SimBus {
    clock: SimClock,
    state: Rc<RefCell<BusState>>,
}

impl SimBus {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            state: Rc::default(),
        }
    }

    pub fn state(&self) -> RefMut<'_, BusState> {
        self.state.borrow_mut()
    }

    /// Times at which XIN actually changed level
    pub fn xin_edges(&self) -> Vec<u64> {
        let state = self.state.borrow();
        let mut level = false;
        let mut edges = Vec::new();
        for &(at, high) in &state.xin_log {
            if high != level {
                edges.push(at);
                level = high;
            }
        }
        edges
    }
}

impl SharpBus for SimBus {
    fn sample(&mut self, line: InputLine) -> bool {
        let now = self.clock.peek();
        let mut state = self.state.borrow_mut();
        match line {
            InputLine::Busy => state.busy || state.busy_stuck,
            InputLine::Dout => state.dout,
            InputLine::Xout => state.xout(now),
            InputLine::Sel1 => state.select & 0x01 != 0,
            InputLine::Sel2 => state.select & 0x02 != 0,
        }
    }

    fn drive(&mut self, line: OutputLine, high: bool) {
        let now = self.clock.peek();
        let mut state = self.state.borrow_mut();
        match line {
            OutputLine::Ack => {
                let was = state.ack;
                state.ack = high;
                if state.responsive && !was && high {
                    state.ack_rising();
                } else if state.responsive && was && !high {
                    state.ack_falling();
                }
            }
            OutputLine::Din => state.din = high,
            OutputLine::Xin => {
                state.xin = high;
                state.xin_log.push((now, high));
            }
            OutputLine::Beep => {
                if high && !state.beep {
                    state.beep_pulses += 1;
                }
                state.beep = high;
            }
        }
    }
}
