//! Save-state lifecycle
//!
//! Two artifacts per save: the raw battery RAM (`.sav`, survives anything)
//! and a versioned JSON full-state snapshot (`.state`, preferred on load
//! because it captures CPU registers and all of memory, not just cartridge
//! RAM).

use crate::console::Console;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const BATTERY_FILE: &str = "pokemon-red.sav";
pub const STATE_FILE: &str = "pokemon-red.state";

const STATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct FullStateFile {
    version: u32,
    saved_at: i64,
    /// Opaque console snapshot, base64.
    console: String,
}

/// Which artifact a restore ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    FullState,
    BatteryRam,
    Fresh,
}

/// Owns the save directory and both save artifacts.
pub struct SaveManager {
    dir: PathBuf,
}

impl SaveManager {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn battery_path(&self) -> PathBuf {
        self.dir.join(BATTERY_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Write both artifacts. Battery first so a crash mid-save still leaves
    /// a usable fallback.
    pub fn persist<C: Console>(&self, console: &C) -> anyhow::Result<()> {
        fs::write(self.battery_path(), console.save_ram())?;

        let file = FullStateFile {
            version: STATE_VERSION,
            saved_at: Utc::now().timestamp(),
            console: BASE64.encode(console.save_full_state()),
        };
        fs::write(self.state_path(), serde_json::to_vec(&file)?)?;
        Ok(())
    }

    /// Boot the console: full state if usable, else battery RAM, else fresh.
    pub fn restore<C: Console>(
        &self,
        console: &mut C,
        rom: &[u8],
    ) -> anyhow::Result<RestoreOutcome> {
        match self.try_full_state(console, rom) {
            Ok(()) => {
                tracing::info!("Restored full state from {:?}", self.state_path());
                return Ok(RestoreOutcome::FullState);
            }
            Err(e) => tracing::warn!("Full-state restore unavailable: {}", e),
        }

        match self.try_battery(console, rom) {
            Ok(()) => {
                tracing::info!("Restored battery RAM from {:?}", self.battery_path());
                return Ok(RestoreOutcome::BatteryRam);
            }
            Err(e) => tracing::warn!("Battery restore unavailable: {}", e),
        }

        console.load_rom(rom, None)?;
        tracing::info!("No usable save found, starting fresh");
        Ok(RestoreOutcome::Fresh)
    }

    fn try_full_state<C: Console>(&self, console: &mut C, rom: &[u8]) -> anyhow::Result<()> {
        let raw = fs::read(self.state_path())?;
        let file: FullStateFile = serde_json::from_slice(&raw)?;
        anyhow::ensure!(
            file.version == STATE_VERSION,
            "state version {} unsupported",
            file.version
        );
        let snapshot = BASE64.decode(file.console)?;
        console.load_rom(rom, None)?;
        console.restore_full_state(&snapshot)?;
        Ok(())
    }

    fn try_battery<C: Console>(&self, console: &mut C, rom: &[u8]) -> anyhow::Result<()> {
        let battery = fs::read(self.battery_path())?;
        anyhow::ensure!(!battery.is_empty(), "battery file empty");
        console.load_rom(rom, Some(&battery))?;
        Ok(())
    }
}
