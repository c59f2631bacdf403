//! Decoded animation and move tables
//!
//! The simulation never decodes asset files itself. Whatever loads the
//! original formats hands over these tables already converted, and the
//! simulation reads them through a shared `Arc` without mutating them.

use std::collections::BTreeMap;

use glam::{IVec2, Vec2};

use super::action::Action;

pub type FighterId = u8;
pub type MoveId = u32;

/// One indexed-color sprite image
///
/// `pixels` holds `width * height` palette indices, row-major. Index 0 is
/// transparent. `offset` places the image's top-left corner relative to the
/// owning object's position when it faces right.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteFrame {
    pub offset: IVec2,
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u8>,
}

impl SpriteFrame {
    pub fn new(offset: IVec2, width: i32, height: i32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width.max(0) * height.max(0)) as usize);
        Self {
            offset,
            width,
            height,
            pixels,
        }
    }

    /// Solid rectangle of one palette index
    pub fn filled(offset: IVec2, width: i32, height: i32, index: u8) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self::new(offset, width, height, vec![index; len])
    }

    pub fn size(&self) -> IVec2 {
        IVec2::new(self.width, self.height)
    }

    /// Palette index at sprite-local `(x, y)`, `None` outside the image
    pub fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Paint a rectangle of `index` into the image, clipped to its bounds
    pub fn paint(&mut self, x: i32, y: i32, w: i32, h: i32, index: u8) {
        for py in y.max(0)..(y + h).min(self.height) {
            for px in x.max(0)..(x + w).min(self.width) {
                self.pixels[(py * self.width + px) as usize] = index;
            }
        }
    }
}

/// A frame of an animation: which sprite to show and for how long
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStep {
    /// Index into [`Animation::sprites`]
    pub sprite: usize,
    /// Ticks the frame stays up (0 is treated as 1)
    pub ticks: u16,
}

/// Sprite-local point that deals a hit while its sprite is displayed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitCoord {
    pub sprite: usize,
    pub pos: IVec2,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub sprites: Vec<SpriteFrame>,
    pub frames: Vec<FrameStep>,
    pub hit_coords: Vec<HitCoord>,
    pub looping: bool,
}

impl Animation {
    pub fn frame(&self, index: usize) -> Option<&FrameStep> {
        self.frames.get(index)
    }

    /// Sprite shown at animation frame `index`
    pub fn sprite_at(&self, index: usize) -> Option<&SpriteFrame> {
        self.frame(index).and_then(|f| self.sprites.get(f.sprite))
    }

    /// Hit coordinates active while animation frame `index` is shown
    pub fn hit_coords_at(&self, index: usize) -> impl Iterator<Item = &HitCoord> {
        let sprite = self.frame(index).map(|f| f.sprite);
        self.hit_coords
            .iter()
            .filter(move |c| Some(c.sprite) == sprite)
    }
}

/// Projectile collision options carried by a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionOptions {
    pub wall_bounce: bool,
    pub stop_on_ground: bool,
    pub invincible: bool,
}

/// How a move launches a projectile
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpec {
    /// Move whose animation and hit data the projectile uses
    pub move_id: MoveId,
    /// Animation frame of the casting move at which the projectile appears
    pub spawn_frame: usize,
    /// Spawn offset from the caster, mirrored when facing left
    pub offset: IVec2,
    /// Initial velocity, x mirrored when facing left
    pub velocity: Vec2,
    pub gravity: f32,
    /// Ticks before the projectile expires on its own
    pub lifetime: u32,
    pub options: CollisionOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveDef {
    pub id: MoveId,
    /// Actions that start this move; empty for moves players cannot trigger
    pub trigger: Action,
    pub animation: Animation,
    pub damage: i32,
    pub stun_ticks: u32,
    pub recovery_ticks: u32,
    pub knockback: Vec2,
    /// Move chained in when this one's animation finishes
    pub successor: Option<MoveId>,
    pub projectile: Option<ProjectileSpec>,
    pub sound: Option<u16>,
}

impl MoveDef {
    fn plain(id: MoveId, animation: Animation) -> Self {
        Self {
            id,
            trigger: Action::empty(),
            animation,
            damage: 0,
            stun_ticks: 0,
            recovery_ticks: 0,
            knockback: Vec2::ZERO,
            successor: None,
            projectile: None,
            sound: None,
        }
    }
}

/// Everything the simulation needs to know about one fighter
#[derive(Debug, Clone, PartialEq)]
pub struct FighterData {
    pub id: FighterId,
    pub name: String,
    pub max_health: i32,
    pub walk_speed: f32,
    pub jump_speed: f32,
    /// Body collision box size, anchored bottom-center on the position
    pub body: IVec2,
    pub idle_move: MoveId,
    pub walk_move: MoveId,
    pub jump_move: MoveId,
    pub crouch_move: MoveId,
    pub stun_move: MoveId,
    pub moves: BTreeMap<MoveId, MoveDef>,
}

impl FighterData {
    pub fn move_def(&self, id: MoveId) -> Option<&MoveDef> {
        self.moves.get(&id)
    }

    /// Most specific move whose trigger is fully contained in `action`
    ///
    /// Ties go to the lowest move id.
    pub fn match_trigger(&self, action: Action) -> Option<&MoveDef> {
        let mut best: Option<&MoveDef> = None;
        for m in self.moves.values() {
            if m.trigger.is_empty() || !action.contains(m.trigger) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => m.trigger.bits().count_ones() > b.trigger.bits().count_ones(),
            };
            if better {
                best = Some(m);
            }
        }
        best
    }
}

/// All fighters available to a match
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetTables {
    pub fighters: Vec<FighterData>,
}

impl AssetTables {
    pub fn fighter(&self, id: FighterId) -> Option<&FighterData> {
        self.fighters.iter().find(|f| f.id == id)
    }

    pub fn move_def(&self, fighter: FighterId, id: MoveId) -> Option<&MoveDef> {
        self.fighter(fighter).and_then(|f| f.move_def(id))
    }

    /// Procedural stand-in fighters for headless matches and tests
    pub fn builtin() -> Self {
        Self {
            fighters: vec![
                builtin_fighter(0, "Jaguar", 100, 3.0, 9.0),
                builtin_fighter(1, "Katana", 90, 3.5, 10.0),
            ],
        }
    }
}

pub mod builtin_moves {
    use super::MoveId;

    pub const IDLE: MoveId = 0;
    pub const WALK: MoveId = 1;
    pub const JUMP: MoveId = 2;
    pub const CROUCH: MoveId = 3;
    pub const STUNNED: MoveId = 4;
    pub const PUNCH: MoveId = 10;
    pub const KICK: MoveId = 11;
    pub const FIREBALL: MoveId = 20;
    pub const FIREBALL_PROJECTILE: MoveId = 21;
}

const BODY_INDEX: u8 = 0x20;
const LIMB_INDEX: u8 = 0x30;
const PROJECTILE_INDEX: u8 = 0x40;

fn body_sprite() -> SpriteFrame {
    SpriteFrame::filled(IVec2::new(-15, -60), 30, 60, BODY_INDEX)
}

fn strike_sprite(limb_y: i32) -> SpriteFrame {
    let mut sprite = SpriteFrame::filled(IVec2::new(-15, -60), 50, 60, 0);
    sprite.paint(0, 0, 30, 60, BODY_INDEX);
    sprite.paint(30, limb_y, 20, 8, LIMB_INDEX);
    sprite
}

fn looping(sprite: SpriteFrame, ticks: u16) -> Animation {
    Animation {
        sprites: vec![sprite],
        frames: vec![FrameStep { sprite: 0, ticks }],
        hit_coords: Vec::new(),
        looping: true,
    }
}

/// Windup, active strike frame, follow-through
fn strike(limb_y: i32, windup: u16, active: u16, follow: u16) -> Animation {
    Animation {
        sprites: vec![body_sprite(), strike_sprite(limb_y)],
        frames: vec![
            FrameStep { sprite: 0, ticks: windup },
            FrameStep { sprite: 1, ticks: active },
            FrameStep { sprite: 0, ticks: follow },
        ],
        hit_coords: vec![
            HitCoord {
                sprite: 1,
                pos: IVec2::new(44, limb_y + 4),
            },
            HitCoord {
                sprite: 1,
                pos: IVec2::new(48, limb_y + 4),
            },
        ],
        looping: false,
    }
}

fn builtin_fighter(
    id: FighterId,
    name: &str,
    max_health: i32,
    walk_speed: f32,
    jump_speed: f32,
) -> FighterData {
    use builtin_moves::*;

    let mut moves = BTreeMap::new();
    for (move_id, ticks) in [(IDLE, 8), (WALK, 6), (JUMP, 8), (CROUCH, 8), (STUNNED, 8)] {
        moves.insert(move_id, MoveDef::plain(move_id, looping(body_sprite(), ticks)));
    }

    moves.insert(
        PUNCH,
        MoveDef {
            trigger: Action::PUNCH,
            damage: 6,
            stun_ticks: 14,
            recovery_ticks: 6,
            knockback: Vec2::new(3.0, 0.0),
            sound: Some(1),
            ..MoveDef::plain(PUNCH, strike(14, 3, 4, 3))
        },
    );
    moves.insert(
        KICK,
        MoveDef {
            trigger: Action::KICK,
            damage: 9,
            stun_ticks: 18,
            recovery_ticks: 8,
            knockback: Vec2::new(4.0, 0.0),
            sound: Some(2),
            ..MoveDef::plain(KICK, strike(36, 4, 4, 4))
        },
    );
    moves.insert(
        FIREBALL,
        MoveDef {
            trigger: Action::DOWN | Action::PUNCH,
            recovery_ticks: 10,
            sound: Some(3),
            projectile: Some(ProjectileSpec {
                move_id: FIREBALL_PROJECTILE,
                spawn_frame: 1,
                offset: IVec2::new(30, -40),
                velocity: Vec2::new(5.0, 0.0),
                gravity: 0.0,
                lifetime: 90,
                options: CollisionOptions::default(),
            }),
            ..MoveDef::plain(
                FIREBALL,
                Animation {
                    sprites: vec![body_sprite()],
                    frames: vec![
                        FrameStep { sprite: 0, ticks: 4 },
                        FrameStep { sprite: 0, ticks: 6 },
                    ],
                    hit_coords: Vec::new(),
                    looping: false,
                },
            )
        },
    );
    moves.insert(
        FIREBALL_PROJECTILE,
        MoveDef {
            damage: 8,
            stun_ticks: 16,
            knockback: Vec2::new(2.0, 0.0),
            sound: Some(4),
            ..MoveDef::plain(
                FIREBALL_PROJECTILE,
                Animation {
                    sprites: vec![SpriteFrame::filled(
                        IVec2::new(-6, -6),
                        12,
                        12,
                        PROJECTILE_INDEX,
                    )],
                    frames: vec![FrameStep { sprite: 0, ticks: 4 }],
                    hit_coords: vec![HitCoord {
                        sprite: 0,
                        pos: IVec2::new(6, 6),
                    }],
                    looping: true,
                },
            )
        },
    );

    FighterData {
        id,
        name: name.to_string(),
        max_health,
        walk_speed,
        jump_speed,
        body: IVec2::new(30, 60),
        idle_move: IDLE,
        walk_move: WALK,
        jump_move: JUMP,
        crouch_move: CROUCH,
        stun_move: STUNNED,
        moves,
    }
}
