//! Match settings and preferences
//!
//! Persisted as JSON next to the executable (or wherever the caller points).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::audio::{AudioManager, AudioSink};
use crate::controller::{
    AiController, Controller, JoystickController, JoystickMap, KeyboardController, Keymap,
    PilotProfile,
};
use crate::error::{ArenaError, SettingsError};
use crate::sim::{AssetTables, FighterId};

/// Who drives a player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    Keyboard(Keymap),
    Joystick(JoystickMap),
    Ai { difficulty: u8, pilot: PilotProfile },
}

impl InputSource {
    /// Controller for `player`; AI pilots derive their generator from `seed`
    pub fn build(&self, seed: u64, player: usize) -> Controller {
        match *self {
            InputSource::Keyboard(keymap) => Controller::Keyboard(KeyboardController::new(keymap)),
            InputSource::Joystick(map) => Controller::Joystick(JoystickController::new(map)),
            InputSource::Ai { difficulty, pilot } => {
                Controller::Ai(AiController::new(seed, player, pilot, difficulty))
            }
        }
    }
}

/// Match setup presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MatchPreset {
    /// Two players sharing a keyboard
    Versus,
    #[default]
    VsComputer,
    /// Computer against computer
    Demo,
}

impl MatchPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPreset::Versus => "Versus",
            MatchPreset::VsComputer => "VsComputer",
            MatchPreset::Demo => "Demo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "versus" | "vs" => Some(MatchPreset::Versus),
            "vscomputer" | "cpu" => Some(MatchPreset::VsComputer),
            "demo" => Some(MatchPreset::Demo),
            _ => None,
        }
    }

    fn inputs(&self) -> [InputSource; 2] {
        let cpu = |difficulty| InputSource::Ai {
            difficulty,
            pilot: PilotProfile::default(),
        };
        match self {
            MatchPreset::Versus => [
                InputSource::Keyboard(Keymap::player_one()),
                InputSource::Keyboard(Keymap::player_two()),
            ],
            MatchPreset::VsComputer => [InputSource::Keyboard(Keymap::player_one()), cpu(2)],
            MatchPreset::Demo => [cpu(3), cpu(3)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub preset: MatchPreset,
    /// Simulation seed; both peers of a networked match must agree on it
    pub seed: u64,
    pub fighters: [FighterId; 2],
    pub inputs: [InputSource; 2],

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,

    // === Netplay ===
    /// Give up on a silent peer after this long
    pub net_timeout_ms: u64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        let preset = MatchPreset::default();
        Self {
            preset,
            seed: 0x5eed,
            fighters: [0, 1],
            inputs: preset.inputs(),

            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,

            net_timeout_ms: 5000,
        }
    }
}

impl MatchSettings {
    /// Create settings from a preset (applies preset defaults)
    pub fn from_preset(preset: MatchPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a preset (replaces both input sources)
    pub fn apply_preset(&mut self, preset: MatchPreset) {
        self.preset = preset;
        self.inputs = preset.inputs();
    }

    pub fn net_timeout(&self) -> Duration {
        Duration::from_millis(self.net_timeout_ms)
    }

    /// Arena with both controller slots filled from these settings
    pub fn build_arena(&self, assets: Arc<AssetTables>) -> Result<Arena, ArenaError> {
        let mut arena = Arena::new(self.seed, self.fighters, assets);
        for (player, source) in self.inputs.iter().enumerate() {
            arena.set_controller(player, source.build(self.seed, player))?;
        }
        Ok(arena)
    }

    pub fn configure_audio<S: AudioSink>(&self, audio: &mut AudioManager<S>) {
        audio.set_master_volume(self.master_volume);
        audio.set_sfx_volume(self.sfx_volume);
        audio.set_muted(self.muted);
    }

    /// Load settings from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let settings = serde_json::from_str(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
