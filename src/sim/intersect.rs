//! Intersection queries
//!
//! Shape-level overlap between objects, point containment, and the
//! pixel-accurate sprite tests used for hits. Nothing in here mutates.
//!
//! Rectangles overlap when their edges touch; a point is inside a rectangle
//! on the half-open range `[pos, pos + size)`, which matches sprite pixel
//! addressing.

use std::ops::RangeInclusive;

use glam::IVec2;

use super::assets::{HitCoord, SpriteFrame};
use super::object::{Facing, PhysicsObject, Shape};

/// Palette indices that count as solid for hit detection (0 is transparent)
pub const SOLID_PALETTE: RangeInclusive<u8> = 1..=255;

pub fn point_rect(p: IVec2, rect_pos: IVec2, size: IVec2) -> bool {
    p.x >= rect_pos.x && p.x < rect_pos.x + size.x && p.y >= rect_pos.y && p.y < rect_pos.y + size.y
}

pub fn point_invrect(p: IVec2, rect_pos: IVec2, size: IVec2) -> bool {
    !point_rect(p, rect_pos, size)
}

pub fn rect_rect(a_pos: IVec2, a_size: IVec2, b_pos: IVec2, b_size: IVec2) -> bool {
    !(a_pos.x > b_pos.x + b_size.x
        || a_pos.y > b_pos.y + b_size.y
        || a_pos.x + a_size.x < b_pos.x
        || a_pos.y + a_size.y < b_pos.y)
}

/// True when rectangle `a` pokes out of the free area of inverted rect `b`
pub fn rect_invrect(a_pos: IVec2, a_size: IVec2, b_pos: IVec2, b_size: IVec2) -> bool {
    a_pos.x + a_size.x > b_pos.x + b_size.x
        || a_pos.y + a_size.y > b_pos.y + b_size.y
        || a_pos.x < b_pos.x
        || a_pos.y < b_pos.y
}

/// Overlap test between two placed shapes
///
/// `a_at` / `b_at` are the owning objects' positions. Two inverted rects
/// never intersect.
pub fn shape_intersect(a: &Shape, a_at: IVec2, b: &Shape, b_at: IVec2) -> bool {
    let pa = a_at + a.offset();
    let pb = b_at + b.offset();
    match (*a, *b) {
        (Shape::Rect { size: sa, .. }, Shape::Rect { size: sb, .. }) => rect_rect(pa, sa, pb, sb),
        (Shape::Point { .. }, Shape::Point { .. }) => pa == pb,
        (Shape::Rect { size, .. }, Shape::Point { .. }) => point_rect(pb, pa, size),
        (Shape::Point { .. }, Shape::Rect { size, .. }) => point_rect(pa, pb, size),
        (Shape::Rect { size: sa, .. }, Shape::InvRect { size: sb, .. }) => rect_invrect(pa, sa, pb, sb),
        (Shape::InvRect { size: sa, .. }, Shape::Rect { size: sb, .. }) => rect_invrect(pb, sb, pa, sa),
        (Shape::Point { .. }, Shape::InvRect { size, .. }) => point_invrect(pa, pb, size),
        (Shape::InvRect { size, .. }, Shape::Point { .. }) => point_invrect(pb, pa, size),
        (Shape::InvRect { .. }, Shape::InvRect { .. }) => false,
    }
}

/// Do the two objects' collision shapes overlap at their current positions?
pub fn intersect_object_object(a: &PhysicsObject, b: &PhysicsObject) -> bool {
    match (a.collision_shape(), b.collision_shape()) {
        (Some(sa), Some(sb)) => shape_intersect(sa, a.pos, sb, b.pos),
        _ => false,
    }
}

/// Does `point` lie within the object's collision shape?
pub fn intersect_object_point(obj: &PhysicsObject, point: IVec2) -> bool {
    match obj.collision_shape() {
        Some(shape) => shape_intersect(shape, obj.pos, &Shape::Point { offset: IVec2::ZERO }, point),
        None => false,
    }
}

/// Top-left corner of a sprite drawn for an object at `pos` facing `facing`
pub fn sprite_origin(pos: IVec2, facing: Facing, sprite: &SpriteFrame) -> IVec2 {
    match facing {
        Facing::Right => pos + sprite.offset,
        Facing::Left => IVec2::new(pos.x - sprite.offset.x - sprite.width, pos.y + sprite.offset.y),
    }
}

/// Palette index of the displayed sprite under a world-space point
fn sprite_pixel_at(pos: IVec2, facing: Facing, sprite: &SpriteFrame, point: IVec2) -> Option<u8> {
    let local = point - sprite_origin(pos, facing, sprite);
    let x = match facing {
        Facing::Right => local.x,
        Facing::Left => sprite.width - 1 - local.x,
    };
    if local.x < 0 || local.x >= sprite.width {
        return None;
    }
    sprite.pixel(x, local.y)
}

/// Is `point` on the object's displayed sprite, on a pixel whose palette
/// index falls within `range` (both ends inclusive)?
pub fn intersect_sprite_point(
    obj: &PhysicsObject,
    sprite: &SpriteFrame,
    point: IVec2,
    range: RangeInclusive<u8>,
) -> bool {
    if !obj.can_collide {
        return false;
    }
    match sprite_pixel_at(obj.pos, obj.facing, sprite, point) {
        Some(index) => range.contains(&index),
        None => false,
    }
}

/// World-space position of a sprite-local hit coordinate
pub fn hit_coord_world(pos: IVec2, facing: Facing, sprite: &SpriteFrame, coord: IVec2) -> IVec2 {
    let origin = sprite_origin(pos, facing, sprite);
    match facing {
        Facing::Right => origin + coord,
        Facing::Left => IVec2::new(origin.x + sprite.width - 1 - coord.x, origin.y + coord.y),
    }
}

/// Project the attacker's hit coordinates onto the target's sprite
///
/// Succeeds once `level` coordinates land on solid target pixels and returns
/// the average of those points in world space.
pub fn intersect_sprite_hitpoint<'a>(
    attacker: &PhysicsObject,
    attacker_sprite: &SpriteFrame,
    coords: impl IntoIterator<Item = &'a HitCoord>,
    target: &PhysicsObject,
    target_sprite: &SpriteFrame,
    level: usize,
) -> Option<IVec2> {
    if !attacker.can_collide || !target.can_collide || level == 0 {
        return None;
    }

    let mut sum = IVec2::ZERO;
    let mut found = 0;
    for coord in coords {
        let point = hit_coord_world(attacker.pos, attacker.facing, attacker_sprite, coord.pos);
        if intersect_sprite_point(target, target_sprite, point, SOLID_PALETTE) {
            sum += point;
            found += 1;
            if found >= level {
                return Some(sum / level as i32);
            }
        }
    }
    None
}
