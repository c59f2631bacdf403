//! Canonical state hash for desync detection
//!
//! Every hashed value is written to a blake3 hasher as fixed-width little
//! endian bytes, fields in declaration order, objects in identity order. The
//! digest is truncated to its first four bytes.
//!
//! Peer-local fields (`this_id`, `net_mode`) and per-tick events are left
//! out so server and client agree on a shared world.

use super::anim::AnimCursor;
use super::har::{Har, HarState};
use super::object::{Facing, HardHandler, ObjectKind, PhysicsObject, Shape, SoftHandler};
use super::projectile::Projectile;
use super::random::RngState;
use super::state::{GameState, MatchPhase, Player, TimedEffect};
use super::ticktimer::TickTimer;

/// Byte sink for [`Digest`] implementations
pub struct StateHasher {
    inner: blake3::Hasher,
}

impl Default for StateHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    pub fn u8(&mut self, v: u8) {
        self.inner.update(&[v]);
    }

    pub fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    pub fn u32(&mut self, v: u32) {
        self.inner.update(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.inner.update(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.inner.update(&v.to_le_bytes());
    }

    /// Bit pattern, so -0.0 and 0.0 hash differently
    pub fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    pub fn finish(&self) -> u32 {
        let digest = self.inner.finalize();
        let b = digest.as_bytes();
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

/// Feed a value's hashed fields into a [`StateHasher`]
pub trait Digest {
    fn digest(&self, h: &mut StateHasher);
}

impl<T: Digest> Digest for Option<T> {
    fn digest(&self, h: &mut StateHasher) {
        match self {
            None => h.u8(0),
            Some(v) => {
                h.u8(1);
                v.digest(h);
            }
        }
    }
}

impl Digest for u32 {
    fn digest(&self, h: &mut StateHasher) {
        h.u32(*self);
    }
}

impl Digest for RngState {
    fn digest(&self, h: &mut StateHasher) {
        h.u64(self.seed);
        h.u64(self.draws);
    }
}

impl Digest for AnimCursor {
    fn digest(&self, h: &mut StateHasher) {
        h.u8(self.fighter);
        h.u32(self.move_id);
        h.u64(self.frame as u64);
        h.u32(self.elapsed as u32);
        h.bool(self.finished);
    }
}

impl Digest for Shape {
    fn digest(&self, h: &mut StateHasher) {
        match *self {
            Shape::Rect { offset, size } => {
                h.u8(0);
                h.i32(offset.x);
                h.i32(offset.y);
                h.i32(size.x);
                h.i32(size.y);
            }
            Shape::Point { offset } => {
                h.u8(1);
                h.i32(offset.x);
                h.i32(offset.y);
            }
            Shape::InvRect { offset, size } => {
                h.u8(2);
                h.i32(offset.x);
                h.i32(offset.y);
                h.i32(size.x);
                h.i32(size.y);
            }
        }
    }
}

impl Digest for Har {
    fn digest(&self, h: &mut StateHasher) {
        h.u64(self.player as u64);
        h.u8(self.fighter);
        h.i32(self.health);
        h.i32(self.max_health);
        h.f32(self.walk_speed);
        h.f32(self.jump_speed);
        h.u8(match self.state {
            HarState::Standing => 0,
            HarState::Walking => 1,
            HarState::Jumping => 2,
            HarState::Crouching => 3,
            HarState::Attacking => 4,
            HarState::Stunned => 5,
            HarState::Recovering => 6,
            HarState::Defeated => 7,
        });
        self.anim.digest(h);
        h.bool(self.in_air);
        h.u32(self.stun_token);
        h.u32(self.recovery_token);
        h.bool(self.hit_landed);
        h.bool(self.projectile_fired);
    }
}

impl Digest for Projectile {
    fn digest(&self, h: &mut StateHasher) {
        self.owner.digest(h);
        h.u64(self.player as u64);
        self.anim.digest(h);
        h.bool(self.wall_bounce);
        h.bool(self.stop_on_ground);
        h.bool(self.invincible);
        h.bool(self.frozen);
        h.bool(self.has_hit());
    }
}

impl Digest for PhysicsObject {
    fn digest(&self, h: &mut StateHasher) {
        h.u32(self.id);
        h.i32(self.pos.x);
        h.i32(self.pos.y);
        h.f32(self.vel.x);
        h.f32(self.vel.y);
        h.f32(self.gravity);
        h.u8(match self.facing {
            Facing::Right => 0,
            Facing::Left => 1,
        });
        h.u8(self.group);
        h.bool(self.can_collide);
        self.shape.digest(h);
        h.u8(match self.soft {
            None => 0,
            Some(SoftHandler::Push) => 1,
        });
        h.u8(match self.hard {
            None => 0,
            Some(HardHandler::Strike) => 1,
            Some(HardHandler::Impact) => 2,
        });
        match &self.kind {
            ObjectKind::Empty => h.u8(0),
            ObjectKind::Har(har) => {
                h.u8(1);
                har.digest(h);
            }
            ObjectKind::Projectile(proj) => {
                h.u8(2);
                proj.digest(h);
            }
        }
        h.bool(self.finished);
    }
}

impl Digest for Player {
    fn digest(&self, h: &mut StateHasher) {
        h.u8(self.fighter);
        self.har.digest(h);
        h.u32(self.score);
        h.u8(self.wins);
    }
}

impl Digest for TimedEffect {
    fn digest(&self, h: &mut StateHasher) {
        match *self {
            TimedEffect::EndStun { target, token } => {
                h.u8(0);
                h.u32(target);
                h.u32(token);
            }
            TimedEffect::EndRecovery { target, token } => {
                h.u8(1);
                h.u32(target);
                h.u32(token);
            }
            TimedEffect::Expire { target } => {
                h.u8(2);
                h.u32(target);
            }
        }
    }
}

impl<T: Digest> Digest for TickTimer<T> {
    fn digest(&self, h: &mut StateHasher) {
        h.u64(self.tick());
        h.u64(self.len() as u64);
        for entry in self.pending() {
            h.u64(entry.target);
            h.u64(entry.seq);
            entry.data.digest(h);
        }
    }
}

impl Digest for GameState {
    fn digest(&self, h: &mut StateHasher) {
        h.u64(self.tick);
        self.rng.state().digest(h);
        h.u32(self.next_id());
        for player in &self.players {
            player.digest(h);
        }
        h.u8(match self.phase {
            MatchPhase::Starting => 0,
            MatchPhase::Fighting => 1,
            MatchPhase::Ending => 2,
        });
        h.u32(self.phase_ticks);
        h.u64(self.objects.len() as u64);
        for obj in self.objects.values() {
            obj.digest(h);
        }
        self.timer.digest(h);
        h.bool(self.rein);
    }
}

/// 32-bit digest of everything that must agree between peers
pub fn state_hash(state: &GameState) -> u32 {
    let mut h = StateHasher::new();
    state.digest(&mut h);
    h.finish()
}
