//! Black-box console interface
//!
//! The emulator core is consumed through this trait; its CPU/PPU internals
//! are someone else's problem. Key codes and screen geometry are fixed by
//! the hardware being emulated.

use indexer_types::Action;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
/// RGBA framebuffer size in bytes.
pub const SCREEN_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4;

pub const KEY_RIGHT: u8 = 0;
pub const KEY_LEFT: u8 = 1;
pub const KEY_UP: u8 = 2;
pub const KEY_DOWN: u8 = 3;
pub const KEY_A: u8 = 4;
pub const KEY_B: u8 = 5;
pub const KEY_SELECT: u8 = 6;
pub const KEY_START: u8 = 7;

/// Map a vote action to the console's key code.
pub fn key_code(action: Action) -> u8 {
    match action {
        Action::Up => KEY_UP,
        Action::Down => KEY_DOWN,
        Action::Left => KEY_LEFT,
        Action::Right => KEY_RIGHT,
        Action::A => KEY_A,
        Action::B => KEY_B,
        Action::Start => KEY_START,
        Action::Select => KEY_SELECT,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("invalid ROM image")]
    InvalidRom,
    #[error("invalid state snapshot: {0}")]
    InvalidState(String),
}

/// The console core as consumed by the driver.
///
/// Not reentrant: the driver serializes every call behind one lock. Key
/// presses are per-frame; a held button is injected on every frame it should
/// stay down.
pub trait Console: Send {
    /// Load a ROM, optionally with battery RAM restored from disk.
    fn load_rom(&mut self, rom: &[u8], save_ram: Option<&[u8]>) -> Result<(), ConsoleError>;

    /// Advance emulation by exactly one video frame.
    fn advance_frame(&mut self);

    /// RGBA framebuffer of the last completed frame (`SCREEN_BYTES` long).
    fn screen(&self) -> &[u8];

    /// Press a key for the next frame.
    fn press_key(&mut self, code: u8);

    /// Cartridge battery RAM (persistent save memory).
    fn save_ram(&self) -> Vec<u8>;

    /// Opaque full snapshot of console state, including CPU registers.
    fn save_full_state(&self) -> Vec<u8>;

    /// Restore a snapshot previously produced by `save_full_state`.
    fn restore_full_state(&mut self, state: &[u8]) -> Result<(), ConsoleError>;

    /// Flat view of the console address space for memory readout.
    fn memory(&self) -> &[u8];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes_cover_all_actions() {
        let mut codes: Vec<u8> = Action::ALL.iter().map(|a| key_code(*a)).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_directional_mapping() {
        assert_eq!(key_code(Action::Up), KEY_UP);
        assert_eq!(key_code(Action::Right), KEY_RIGHT);
        assert_eq!(key_code(Action::Start), KEY_START);
    }
}
