//! Arena Sim - deterministic core of a 2D fighting game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (objects, collisions, timer, state hash)
//! - `controller`: Keyboard, joystick, AI and remote input sources
//! - `arena`: Match driver (phases, controller polling, lockstep, resync)
//! - `net`: Lockstep wire messages and transport
//! - `render`: Read-only per-tick snapshots for an external renderer
//! - `audio`: Sound request boundary
//! - `settings`: Data-driven match configuration

pub mod arena;
pub mod audio;
pub mod controller;
pub mod error;
pub mod net;
pub mod render;
pub mod settings;
pub mod sim;

pub use arena::{Arena, StepOutcome};
pub use error::{ArenaError, NetError, SettingsError};
pub use settings::MatchSettings;

/// Game configuration constants
pub mod consts {
    /// Simulation ticks per second
    pub const SIM_TICK_RATE: u32 = 100;

    /// Arena bounds in pixels; x grows right, y grows down
    pub const ARENA_LEFT_WALL: i32 = 20;
    pub const ARENA_RIGHT_WALL: i32 = 300;
    pub const ARENA_FLOOR: i32 = 190;

    /// Har spawn x per player slot
    pub const HAR_START_X: [i32; 2] = [100, 220];
    /// Downward acceleration on airborne hars (pixels/tick²)
    pub const HAR_GRAVITY: f32 = 0.5;
    /// Horizontal velocity kept per tick while a har slides from a hit
    pub const KNOCKBACK_DECAY: f32 = 0.8;

    /// Opaque pixels a hit coordinate must find in the target sprite
    pub const HIT_LEVEL: usize = 1;

    /// Intro length before inputs are accepted
    pub const ROUND_START_TICKS: u32 = 100;
    /// Pause after a knockout before the next round
    pub const ROUND_END_TICKS: u32 = 200;
}
