//! Physics objects
//!
//! One object type for everything that lives in the arena. What an object
//! *is* comes from its [`ObjectKind`] payload; how it reacts to contact comes
//! from its soft/hard collision handlers. Both are plain enums dispatched with
//! `match`, so objects stay `Clone` and hashable for rollback and desync
//! checks.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use super::assets::{AssetTables, SpriteFrame};
use super::har::Har;
use super::projectile::Projectile;

/// Stable object identity, never reused within a match
pub type ObjectId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    Right,
    Left,
}

impl Facing {
    pub fn sign(self) -> i32 {
        match self {
            Facing::Right => 1,
            Facing::Left => -1,
        }
    }

    pub fn toward(from_x: i32, to_x: i32) -> Self {
        if to_x < from_x {
            Facing::Left
        } else {
            Facing::Right
        }
    }
}

/// Collision shape, placed at `object.pos + offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Rect { offset: IVec2, size: IVec2 },
    Point { offset: IVec2 },
    /// Everything outside the rectangle is solid
    InvRect { offset: IVec2, size: IVec2 },
}

impl Shape {
    /// Rectangle of `size` standing on the position (bottom-center anchor)
    pub fn body(size: IVec2) -> Self {
        Shape::Rect {
            offset: IVec2::new(-size.x / 2, -size.y),
            size,
        }
    }

    pub fn offset(&self) -> IVec2 {
        match *self {
            Shape::Rect { offset, .. } | Shape::Point { offset } | Shape::InvRect { offset, .. } => {
                offset
            }
        }
    }

    /// Zero or negative extents make a shape unusable for collision
    pub fn is_degenerate(&self) -> bool {
        match *self {
            Shape::Rect { size, .. } | Shape::InvRect { size, .. } => size.x <= 0 || size.y <= 0,
            Shape::Point { .. } => false,
        }
    }
}

/// Response to shapes overlapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftHandler {
    /// Push both bodies apart horizontally
    Push,
}

/// Response to a pixel-level hit landing on another object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardHandler {
    /// A har's attack frame connecting
    Strike,
    /// A projectile connecting
    Impact,
}

/// Per-kind payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ObjectKind {
    #[default]
    Empty,
    Har(Box<Har>),
    Projectile(Box<Projectile>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsObject {
    /// Assigned by the game state when the object is added
    pub id: ObjectId,
    pub pos: IVec2,
    pub vel: Vec2,
    pub gravity: f32,
    pub facing: Facing,
    /// Objects sharing a non-zero group never collide with each other
    pub group: u8,
    pub can_collide: bool,
    pub shape: Option<Shape>,
    pub soft: Option<SoftHandler>,
    pub hard: Option<HardHandler>,
    pub kind: ObjectKind,
    /// Set when the object's behavior is done; removed at the next cleanup
    pub finished: bool,
}

impl PhysicsObject {
    /// Bare object with no shape and no payload
    pub fn create(x: i32, y: i32, vx: f32, vy: f32, can_collide: bool) -> Self {
        Self {
            id: 0,
            pos: IVec2::new(x, y),
            vel: Vec2::new(vx, vy),
            gravity: 0.0,
            facing: Facing::Right,
            group: 0,
            can_collide,
            shape: None,
            soft: None,
            hard: None,
            kind: ObjectKind::Empty,
            finished: false,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_kind(mut self, kind: ObjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_handlers(mut self, soft: Option<SoftHandler>, hard: Option<HardHandler>) -> Self {
        self.soft = soft;
        self.hard = hard;
        self
    }

    /// Release the owned shape, handlers and payload
    ///
    /// Returns true if anything was released; a second call is a no-op.
    pub fn free(&mut self) -> bool {
        let had_shape = self.shape.take().is_some();
        let had_payload = !matches!(std::mem::take(&mut self.kind), ObjectKind::Empty);
        self.soft = None;
        self.hard = None;
        had_shape || had_payload
    }

    /// Shape to use for this tick's collision queries, if any
    ///
    /// Non-colliding objects have none, and neither do objects with a
    /// degenerate shape.
    pub fn collision_shape(&self) -> Option<&Shape> {
        if !self.can_collide {
            return None;
        }
        self.shape.as_ref().filter(|shape| !shape.is_degenerate())
    }

    pub fn har(&self) -> Option<&Har> {
        match &self.kind {
            ObjectKind::Har(h) => Some(h),
            _ => None,
        }
    }

    pub fn har_mut(&mut self) -> Option<&mut Har> {
        match &mut self.kind {
            ObjectKind::Har(h) => Some(h),
            _ => None,
        }
    }

    pub fn projectile(&self) -> Option<&Projectile> {
        match &self.kind {
            ObjectKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn projectile_mut(&mut self) -> Option<&mut Projectile> {
        match &mut self.kind {
            ObjectKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    /// Sprite currently displayed by this object's animation
    pub fn current_sprite<'a>(&self, assets: &'a AssetTables) -> Option<&'a SpriteFrame> {
        match &self.kind {
            ObjectKind::Har(h) => h.anim.sprite(assets),
            ObjectKind::Projectile(p) => p.anim.sprite(assets),
            ObjectKind::Empty => None,
        }
    }

    /// Integrate velocity into the integer position
    pub fn integrate(&mut self) {
        self.pos += self.vel.round().as_ivec2();
    }
}
