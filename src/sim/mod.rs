//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by object identity)
//! - No rendering, audio, network or platform dependencies

pub mod action;
pub mod anim;
pub mod assets;
pub mod har;
pub mod hash;
pub mod intersect;
pub mod object;
pub mod projectile;
pub mod random;
pub mod state;
pub mod tick;
pub mod ticktimer;

pub use action::Action;
pub use anim::AnimCursor;
pub use assets::{AssetTables, FighterData, FighterId, MoveDef, MoveId, SpriteFrame};
pub use har::{Har, HarState};
pub use hash::state_hash;
pub use intersect::{
    SOLID_PALETTE, intersect_object_object, intersect_object_point, intersect_sprite_hitpoint,
    intersect_sprite_point, sprite_origin,
};
pub use object::{Facing, ObjectId, ObjectKind, PhysicsObject, Shape};
pub use projectile::Projectile;
pub use random::{GameRng, RngState};
pub use state::{GameEvent, GameState, MatchPhase, NetMode, Player, SoundRequest, TimedEffect};
pub use tick::{TickInput, tick};
pub use ticktimer::TickTimer;
