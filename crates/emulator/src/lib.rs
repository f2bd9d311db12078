//! Emulator Driver - console ownership, frame clock, saves, readout
//!
//! Owns the console instance end to end: runs the frame clock, injects the
//! winning button, persists and restores save state, and samples game state
//! from console memory on a fixed cadence.

pub mod console;
pub mod driver;
pub mod memory;
pub mod rom;
pub mod savestate;

pub use console::{Console, ConsoleError, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use driver::{DriverConfig, EmulatorDriver, FrameSink};
pub use savestate::{RestoreOutcome, SaveManager};
