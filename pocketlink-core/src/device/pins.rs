//! Pin-backed bus
//!
//! Maps the bus lines onto plain GPIO pins from the HAL.

use pocketlink_hal::{InputPin, OutputPin};

use crate::traits::{InputLine, OutputLine, SharpBus};

/// Lines driven by the pocket computer
pub struct BusInputs<I> {
    pub busy: I,
    pub dout: I,
    pub xout: I,
    pub sel1: I,
    pub sel2: I,
}

/// Lines driven by the bridge
pub struct BusOutputs<O> {
    pub ack: O,
    pub din: O,
    pub xin: O,
    pub beep: O,
}

/// Sharp bus over GPIO pins
pub struct SharpPins<I, O> {
    inputs: BusInputs<I>,
    outputs: BusOutputs<O>,
}

impl<I: InputPin, O: OutputPin> SharpPins<I, O> {
    pub fn new(inputs: BusInputs<I>, outputs: BusOutputs<O>) -> Self {
        Self { inputs, outputs }
    }

    fn output(&mut self, line: OutputLine) -> &mut O {
        match line {
            OutputLine::Ack => &mut self.outputs.ack,
            OutputLine::Din => &mut self.outputs.din,
            OutputLine::Xin => &mut self.outputs.xin,
            OutputLine::Beep => &mut self.outputs.beep,
        }
    }
}

impl<I: InputPin, O: OutputPin> SharpBus for SharpPins<I, O> {
    fn sample(&mut self, line: InputLine) -> bool {
        let pin = match line {
            InputLine::Busy => &mut self.inputs.busy,
            InputLine::Dout => &mut self.inputs.dout,
            InputLine::Xout => &mut self.inputs.xout,
            InputLine::Sel1 => &mut self.inputs.sel1,
            InputLine::Sel2 => &mut self.inputs.sel2,
        };
        pin.is_high()
    }

    fn drive(&mut self, line: OutputLine, high: bool) {
        self.output(line).set_state(high);
    }
}
