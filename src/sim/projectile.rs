//! Projectiles launched by har moves

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::anim::AnimCursor;
use super::assets::{AssetTables, CollisionOptions};
use super::object::{ObjectId, ObjectKind, PhysicsObject};
use crate::consts::*;

/// Velocity kept after bouncing off a wall or the floor
pub const BOUNCE_DAMPING: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Projectile {
    /// Har that launched it; cleared if that har goes away first
    pub owner: Option<ObjectId>,
    pub player: usize,
    pub anim: AnimCursor,
    pub wall_bounce: bool,
    pub stop_on_ground: bool,
    pub invincible: bool,
    /// Came to rest on the ground and stopped moving
    pub frozen: bool,
    has_hit: bool,
}

impl Projectile {
    pub fn new(owner: ObjectId, player: usize, anim: AnimCursor, options: CollisionOptions) -> Self {
        Self {
            owner: Some(owner),
            player,
            anim,
            wall_bounce: options.wall_bounce,
            stop_on_ground: options.stop_on_ground,
            invincible: options.invincible,
            frozen: false,
            has_hit: false,
        }
    }

    pub fn has_hit(&self) -> bool {
        self.has_hit
    }

    /// Mark the projectile as having hit something
    ///
    /// Returns true only for the call that made the transition.
    pub fn register_hit(&mut self) -> bool {
        if self.has_hit {
            return false;
        }
        self.has_hit = true;
        true
    }
}

/// Per-tick movement with wall and floor handling
pub fn projectile_move(obj: &mut PhysicsObject) {
    let ObjectKind::Projectile(proj) = &mut obj.kind else {
        return;
    };
    if proj.frozen {
        return;
    }

    obj.pos.x += obj.vel.x.round() as i32;
    obj.vel.y += obj.gravity;
    obj.pos.y += obj.vel.y.round() as i32;

    if proj.wall_bounce {
        if obj.pos.x < ARENA_LEFT_WALL {
            obj.pos.x = ARENA_LEFT_WALL;
            obj.vel.x = -obj.vel.x * BOUNCE_DAMPING;
        }
        if obj.pos.x > ARENA_RIGHT_WALL {
            obj.pos.x = ARENA_RIGHT_WALL;
            obj.vel.x = -obj.vel.x * BOUNCE_DAMPING;
        }
    } else if !proj.invincible && (obj.pos.x < ARENA_LEFT_WALL || obj.pos.x > ARENA_RIGHT_WALL) {
        obj.pos.x = obj.pos.x.clamp(ARENA_LEFT_WALL, ARENA_RIGHT_WALL);
        obj.finished = true;
    }

    if obj.pos.y > ARENA_FLOOR {
        obj.pos.y = ARENA_FLOOR;
        obj.vel.y = -obj.vel.y * BOUNCE_DAMPING;
        obj.vel.x *= BOUNCE_DAMPING;
    }

    let g = obj.gravity * 1.1;
    let resting = obj.pos.y >= ARENA_FLOOR - 5
        && obj.vel.x.abs() < 0.1
        && obj.vel.y < g
        && obj.vel.y > -g;
    if resting && proj.stop_on_ground {
        proj.frozen = true;
        obj.vel = Vec2::ZERO;
    }
}

/// Advance the projectile's animation, chaining or finishing at the end
pub fn projectile_animate(obj: &mut PhysicsObject, assets: &AssetTables) {
    let ObjectKind::Projectile(proj) = &mut obj.kind else {
        return;
    };
    if !proj.anim.advance(assets) {
        return;
    }
    match proj.anim.move_def(assets).and_then(|m| m.successor) {
        Some(next) => {
            proj.anim = AnimCursor::new(proj.anim.fighter, next);
            obj.vel = Vec2::ZERO;
        }
        None => obj.finished = true,
    }
}

/// React to landing a hit: play the successor move if any, else finish
pub fn projectile_impact(obj: &mut PhysicsObject, assets: &AssetTables) {
    let ObjectKind::Projectile(proj) = &mut obj.kind else {
        return;
    };
    match proj.anim.move_def(assets).and_then(|m| m.successor) {
        Some(next) => {
            proj.anim = AnimCursor::new(proj.anim.fighter, next);
            obj.vel = Vec2::ZERO;
            obj.can_collide = false;
        }
        None => obj.finished = true,
    }
}
