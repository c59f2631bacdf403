//! Per-tick render snapshot
//!
//! Read-only view of the world for an external renderer. Object instances
//! are plain `#[repr(C)]` records that can be uploaded to a GPU buffer as-is.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::sim::{AnimCursor, Facing, GameState, MatchPhase, ObjectKind, sprite_origin};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstanceFlags: u32 {
        /// Sprite drawn mirrored
        const FACING_LEFT = 1 << 0;
        const HAR = 1 << 1;
        const PROJECTILE = 1 << 2;
        /// Passes through collision queries this tick
        const GHOST = 1 << 3;
    }
}

/// One drawable object
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable, Serialize)]
pub struct ObjectInstance {
    /// Top-left corner of the displayed sprite in arena pixels
    pub origin: [i32; 2],
    /// Sprite size in pixels
    pub size: [i32; 2],
    pub fighter: u32,
    pub move_id: u32,
    pub frame: u32,
    /// [`InstanceFlags`] bits
    pub flags: u32,
}

impl ObjectInstance {
    pub fn flags(&self) -> InstanceFlags {
        InstanceFlags::from_bits_truncate(self.flags)
    }
}

/// Player fields shown on the HUD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlayerHud {
    pub score: u32,
    pub wins: u8,
    pub health: i32,
    pub max_health: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub tick: u64,
    pub phase: MatchPhase,
    /// In object identity order, so later objects draw on top
    pub instances: Vec<ObjectInstance>,
    pub players: [PlayerHud; 2],
}

impl RenderSnapshot {
    pub fn capture(state: &GameState) -> Self {
        let assets = state.assets();
        let mut instances = Vec::with_capacity(state.objects.len());
        for obj in state.objects.values() {
            let (anim, mut flags): (&AnimCursor, _) = match &obj.kind {
                ObjectKind::Har(h) => (&h.anim, InstanceFlags::HAR),
                ObjectKind::Projectile(p) => (&p.anim, InstanceFlags::PROJECTILE),
                ObjectKind::Empty => continue,
            };
            // Nothing to draw between animations
            let Some(sprite) = anim.sprite(assets) else {
                continue;
            };
            if obj.facing == Facing::Left {
                flags |= InstanceFlags::FACING_LEFT;
            }
            if !obj.can_collide {
                flags |= InstanceFlags::GHOST;
            }
            let origin = sprite_origin(obj.pos, obj.facing, sprite);
            instances.push(ObjectInstance {
                origin: origin.to_array(),
                size: [sprite.width, sprite.height],
                fighter: anim.fighter as u32,
                move_id: anim.move_id,
                frame: anim.frame as u32,
                flags: flags.bits(),
            });
        }

        let players = std::array::from_fn(|p| {
            let player = &state.players[p];
            let (health, max_health) = state
                .har(p)
                .map_or((0, 0), |h| (h.health.max(0), h.max_health));
            PlayerHud {
                score: player.score,
                wins: player.wins,
                health,
                max_health,
            }
        });

        Self {
            tick: state.tick,
            phase: state.phase,
            instances,
            players,
        }
    }

    /// Instance data as raw bytes for a vertex buffer
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::AssetTables;

    fn new_state() -> GameState {
        GameState::new(5, [0, 1], Arc::new(AssetTables::builtin()))
    }

    #[test]
    fn test_capture_both_hars() {
        let state = new_state();
        let snap = RenderSnapshot::capture(&state);
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.instances.len(), 2);
        assert!(snap.instances[0].flags().contains(InstanceFlags::HAR));
        assert!(!snap.instances[0].flags().contains(InstanceFlags::FACING_LEFT));
        assert!(snap.instances[1].flags().contains(InstanceFlags::FACING_LEFT));
        assert_eq!(snap.players[0].health, snap.players[0].max_health);
        assert!(snap.players[0].health > 0);
    }

    #[test]
    fn test_mirrored_origin() {
        let state = new_state();
        let snap = RenderSnapshot::capture(&state);
        let right = snap.instances[0];
        let left = snap.instances[1];
        let p1 = state.har_object(0).unwrap();
        let p2 = state.har_object(1).unwrap();
        let s1 = p1.current_sprite(state.assets()).unwrap();
        let s2 = p2.current_sprite(state.assets()).unwrap();
        assert_eq!(right.origin[0], p1.pos.x + s1.offset.x);
        assert_eq!(left.origin[0], p2.pos.x - s2.offset.x - s2.width);
        assert_eq!(left.origin[1], p2.pos.y + s2.offset.y);
    }

    #[test]
    fn test_instance_bytes_len() {
        let snap = RenderSnapshot::capture(&new_state());
        assert_eq!(
            snap.instance_bytes().len(),
            snap.instances.len() * std::mem::size_of::<ObjectInstance>()
        );
        assert_eq!(std::mem::size_of::<ObjectInstance>(), 32);
    }

    #[test]
    fn test_missing_har_reads_empty_health() {
        let mut state = new_state();
        let id = state.players[1].har.unwrap();
        state.remove_object(id);
        let snap = RenderSnapshot::capture(&state);
        assert_eq!(snap.instances.len(), 1);
        assert_eq!(snap.players[1].health, 0);
    }
}
