//! Emulator driver - frame clock, button queue, sampling timers
//!
//! The console is not reentrant, so every access goes through one lock: the
//! clock task advances frames, the sampler reads memory, and the auto-save
//! timer serializes state. The button queue holds at most one pending press;
//! a new winner simply replaces whatever was still held down.

use crate::console::{key_code, Console};
use crate::memory::read_game_state;
use crate::savestate::SaveManager;
use indexer_types::{Action, GameState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Consumer of raw RGBA framebuffers (the compression pipeline).
pub trait FrameSink: Send + Sync {
    fn push_frame(&self, rgba: Vec<u8>);
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Frame clock rate.
    pub fps: u32,
    /// Frames a pressed button stays held without an explicit duration.
    pub button_hold_frames: u32,
    /// Cadence of the game-state sampler.
    pub state_sample_interval: Duration,
    /// Cadence of the periodic save.
    pub autosave_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            button_hold_frames: 5,
            state_sample_interval: Duration::from_secs(2),
            autosave_interval: Duration::from_secs(60),
        }
    }
}

struct ActivePress {
    code: u8,
    frames_remaining: u32,
}

struct DriverShared<C: Console> {
    console: Mutex<C>,
    pending: Mutex<Option<ActivePress>>,
    saves: SaveManager,
    config: DriverConfig,
    frames: Arc<dyn FrameSink>,
    states: mpsc::UnboundedSender<GameState>,
    last_state: Mutex<Option<GameState>>,
}

/// Exclusive owner of the console and its save files.
pub struct EmulatorDriver<C: Console> {
    shared: Arc<DriverShared<C>>,
}

impl<C: Console> Clone for EmulatorDriver<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Console + 'static> EmulatorDriver<C> {
    /// Wrap an already-booted console (ROM loaded, state restored).
    pub fn new(
        console: C,
        saves: SaveManager,
        config: DriverConfig,
        frames: Arc<dyn FrameSink>,
        states: mpsc::UnboundedSender<GameState>,
    ) -> Self {
        Self {
            shared: Arc::new(DriverShared {
                console: Mutex::new(console),
                pending: Mutex::new(None),
                saves,
                config,
                frames,
                states,
                last_state: Mutex::new(None),
            }),
        }
    }

    /// Queue a button press. Replaces any press still being held.
    pub fn press_button(&self, action: Action, hold_frames: Option<u32>) {
        let frames = hold_frames.unwrap_or(self.shared.config.button_hold_frames);
        tracing::debug!("Pressing {} for {} frames", action, frames);
        *self.shared.pending.lock() = Some(ActivePress {
            code: key_code(action),
            frames_remaining: frames,
        });
    }

    /// Whether a press is still being injected (mostly for tests).
    pub fn press_active(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    /// Advance one frame: inject the held key, step the core, ship the
    /// framebuffer to the compressor.
    pub fn tick(&self) {
        let frame = {
            let mut console = self.shared.console.lock();
            {
                let mut pending = self.shared.pending.lock();
                if let Some(press) = pending.as_mut() {
                    console.press_key(press.code);
                    press.frames_remaining -= 1;
                    if press.frames_remaining == 0 {
                        *pending = None;
                    }
                }
            }
            console.advance_frame();
            console.screen().to_vec()
        };
        self.shared.frames.push_frame(frame);
    }

    /// Read game state from memory; broadcast only on semantic change.
    pub fn sample_game_state(&self) {
        let state = {
            let console = self.shared.console.lock();
            read_game_state(console.memory())
        };
        let Some(state) = state else {
            return;
        };

        let mut last = self.shared.last_state.lock();
        let changed = last
            .as_ref()
            .map_or(true, |prev| prev.semantically_differs(&state));
        if changed {
            tracing::info!(
                "Game state changed: {} | badges {} | party {} | ${}",
                state.location,
                state.badge_count,
                state.party_count,
                state.money
            );
            *last = Some(state.clone());
            let _ = self.shared.states.send(state);
        }
    }

    /// Serialize both save artifacts now. Used by the auto-save timer and
    /// the shutdown path.
    pub fn save_now(&self) -> anyhow::Result<()> {
        let console = self.shared.console.lock();
        self.shared.saves.persist(&*console)
    }

    /// Spawn the frame clock.
    pub fn spawn_clock(&self) -> JoinHandle<()> {
        let driver = self.clone();
        let period = Duration::from_secs_f64(1.0 / driver.shared.config.fps as f64);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!("Frame clock started at {} fps", driver.shared.config.fps);
            loop {
                interval.tick().await;
                driver.tick();
            }
        })
    }

    /// Spawn the game-state sampler.
    pub fn spawn_state_sampler(&self) -> JoinHandle<()> {
        let driver = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(driver.shared.config.state_sample_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                driver.sample_game_state();
            }
        })
    }

    /// Spawn the periodic save timer. Failures are retried next tick.
    pub fn spawn_autosave(&self) -> JoinHandle<()> {
        let driver = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(driver.shared.config.autosave_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match driver.save_now() {
                    Ok(()) => tracing::debug!("Auto-save complete"),
                    Err(e) => tracing::warn!("Auto-save failed (will retry): {}", e),
                }
            }
        })
    }
}
