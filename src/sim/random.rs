//! Seeded random number source
//!
//! Every gameplay roll goes through a [`GameRng`] handle that is passed
//! explicitly to whoever needs it. The generator counts its draws so its full
//! state is the pair `(seed, draws)`, which is what gets hashed, snapshotted
//! and sent over the wire.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Serializable generator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    /// Number of 32-bit outputs consumed since seeding
    pub draws: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, draws: 0 }
    }

    /// Rebuild a generator positioned at this state
    pub fn to_rng(&self) -> Pcg32 {
        let mut rng = Pcg32::seed_from_u64(self.seed);
        rng.advance(self.draws);
        rng
    }
}

/// Reproducible PRNG handle
///
/// Each call consumes exactly one 32-bit output, so two generators with the
/// same `(seed, draws)` always produce the same next value.
#[derive(Debug, Clone)]
pub struct GameRng {
    state: RngState,
    inner: Pcg32,
}

impl GameRng {
    pub fn new(seed: u64) -> Self {
        Self::from_state(RngState::new(seed))
    }

    pub fn from_state(state: RngState) -> Self {
        Self {
            inner: state.to_rng(),
            state,
        }
    }

    pub fn state(&self) -> RngState {
        self.state
    }

    pub fn seed(&self) -> u64 {
        self.state.seed
    }

    /// Full-range 32-bit value
    pub fn next_u32(&mut self) -> u32 {
        self.state.draws += 1;
        self.inner.next_u32()
    }

    /// Integer in `[0, upper)`; returns 0 when `upper` is 0
    pub fn int(&mut self, upper: u32) -> u32 {
        let raw = self.next_u32();
        ((raw as u64 * upper as u64) >> 32) as u32
    }

    /// Float in `[0.0, 1.0]`
    pub fn float(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// True with probability `p` (clamped to `[0, 1]`)
    pub fn chance(&mut self, p: f32) -> bool {
        self.float() < p.clamp(0.0, 1.0)
    }
}

impl PartialEq for GameRng {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Serialize for GameRng {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.state.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameRng {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RngState::deserialize(deserializer).map(Self::from_state)
    }
}
