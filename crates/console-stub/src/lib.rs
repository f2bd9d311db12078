//! Stub console core
//!
//! Stands in for the hardware emulator core behind the `Console` trait.
//! Deterministic by construction: frames derive from a frame counter and the
//! last key pressed, memory starts zeroed and round-trips bit-exactly through
//! full-state snapshots. Lets the rest of the pipeline run (and be tested)
//! without a licensed core linked in.

use emulator::console::{Console, ConsoleError, SCREEN_HEIGHT, SCREEN_WIDTH};

const MEMORY_LEN: usize = 0x10000;
const BATTERY_LEN: usize = 0x2000;
/// Battery RAM window in the address space.
const BATTERY_BASE: usize = 0xA000;
const SCREEN_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4;

/// Deterministic `Console` implementation.
pub struct StubConsole {
    rom: Vec<u8>,
    memory: Vec<u8>,
    battery: Vec<u8>,
    screen: Vec<u8>,
    frame_counter: u64,
    /// Key latched for the next frame only.
    pressed: Option<u8>,
}

impl StubConsole {
    pub fn new() -> Self {
        Self {
            rom: Vec::new(),
            memory: vec![0; MEMORY_LEN],
            battery: vec![0; BATTERY_LEN],
            screen: vec![0; SCREEN_LEN],
            frame_counter: 0,
            pressed: None,
        }
    }

    /// Write bytes directly into the address space. The real core mutates
    /// memory by running the game; the stub is mutated by hand.
    pub fn poke_memory(&mut self, addr: usize, bytes: &[u8]) {
        self.memory[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// Overwrite the start of battery RAM.
    pub fn poke_battery(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(BATTERY_LEN);
        self.battery[..len].copy_from_slice(&bytes[..len]);
        self.memory[BATTERY_BASE..BATTERY_BASE + len].copy_from_slice(&bytes[..len]);
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

impl Default for StubConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StubConsole {
    fn load_rom(&mut self, rom: &[u8], save_ram: Option<&[u8]>) -> Result<(), ConsoleError> {
        if rom.is_empty() {
            return Err(ConsoleError::InvalidRom);
        }
        self.rom = rom.to_vec();
        self.memory = vec![0; MEMORY_LEN];
        self.battery = vec![0; BATTERY_LEN];
        self.frame_counter = 0;
        self.pressed = None;
        if let Some(save_ram) = save_ram {
            self.poke_battery(save_ram);
        }
        Ok(())
    }

    fn advance_frame(&mut self) {
        self.frame_counter += 1;
        // Deterministic pattern so successive frames differ and a pressed
        // key is visible in the output.
        let key = self.pressed.take().unwrap_or(0xff);
        let seed = self.frame_counter as u8;
        for (i, pixel) in self.screen.chunks_exact_mut(4).enumerate() {
            let shade = seed.wrapping_add(i as u8) ^ key;
            pixel[0] = shade;
            pixel[1] = shade;
            pixel[2] = shade;
            pixel[3] = 0xff;
        }
    }

    fn screen(&self) -> &[u8] {
        &self.screen
    }

    fn press_key(&mut self, code: u8) {
        self.pressed = Some(code);
    }

    fn save_ram(&self) -> Vec<u8> {
        self.battery.clone()
    }

    fn save_full_state(&self) -> Vec<u8> {
        let mut state = Vec::with_capacity(8 + MEMORY_LEN + BATTERY_LEN);
        state.extend_from_slice(&self.frame_counter.to_le_bytes());
        state.extend_from_slice(&self.memory);
        state.extend_from_slice(&self.battery);
        state
    }

    fn restore_full_state(&mut self, state: &[u8]) -> Result<(), ConsoleError> {
        let expected = 8 + MEMORY_LEN + BATTERY_LEN;
        if state.len() != expected {
            return Err(ConsoleError::InvalidState(format!(
                "expected {} bytes, got {}",
                expected,
                state.len()
            )));
        }
        self.frame_counter = u64::from_le_bytes(state[..8].try_into().expect("8 bytes"));
        self.memory = state[8..8 + MEMORY_LEN].to_vec();
        self.battery = state[8 + MEMORY_LEN..].to_vec();
        Ok(())
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rom_rejects_empty_image() {
        let mut console = StubConsole::new();
        assert!(console.load_rom(&[], None).is_err());
        assert!(console.load_rom(b"rom", None).is_ok());
    }

    #[test]
    fn test_frames_are_deterministic() {
        let mut a = StubConsole::new();
        let mut b = StubConsole::new();
        a.load_rom(b"rom", None).unwrap();
        b.load_rom(b"rom", None).unwrap();

        a.press_key(3);
        b.press_key(3);
        a.advance_frame();
        b.advance_frame();

        assert_eq!(a.screen(), b.screen());
    }

    #[test]
    fn test_key_press_lasts_one_frame() {
        let mut console = StubConsole::new();
        console.load_rom(b"rom", None).unwrap();

        console.press_key(4);
        console.advance_frame();
        let pressed_frame = console.screen().to_vec();

        let mut other = StubConsole::new();
        other.load_rom(b"rom", None).unwrap();
        other.advance_frame();

        // Same frame number, no key: output differs from the pressed frame.
        assert_ne!(pressed_frame, other.screen());
    }

    #[test]
    fn test_full_state_roundtrip() {
        let mut console = StubConsole::new();
        console.load_rom(b"rom", None).unwrap();
        console.advance_frame();
        console.poke_memory(0x1000, &[1, 2, 3]);
        console.poke_battery(&[9, 9]);

        let snapshot = console.save_full_state();

        let mut restored = StubConsole::new();
        restored.load_rom(b"rom", None).unwrap();
        restored.restore_full_state(&snapshot).unwrap();

        assert_eq!(restored.memory(), console.memory());
        assert_eq!(restored.save_ram(), console.save_ram());
        assert_eq!(restored.frame_counter(), 1);
    }

    #[test]
    fn test_restore_rejects_truncated_state() {
        let mut console = StubConsole::new();
        console.load_rom(b"rom", None).unwrap();
        assert!(console.restore_full_state(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_battery_restored_via_load_rom() {
        let mut console = StubConsole::new();
        console.load_rom(b"rom", Some(&[5u8; 32])).unwrap();
        assert_eq!(&console.save_ram()[..32], &[5u8; 32]);
        // Battery is visible through the memory window too.
        assert_eq!(&console.memory()[0xA000..0xA020], &[5u8; 32]);
    }
}
