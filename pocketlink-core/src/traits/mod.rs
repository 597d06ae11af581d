//! Hardware abstraction traits
//!
//! These traits define the interface between the bridge logic and the
//! board-specific line drivers.

pub mod bus;

pub use bus::{InputLine, OutputLine, SharpBus};
