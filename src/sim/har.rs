//! Fighting robot (HAR) behavior
//!
//! A har is a [`PhysicsObject`] carrying a [`Har`] payload. Input turns into
//! movement or a move from the fighter's move table; the move's animation
//! drives hit frames, projectile launches and successor chaining.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::anim::AnimCursor;
use super::assets::{AssetTables, FighterId, MoveId, ProjectileSpec};
use super::object::{Facing, ObjectKind, PhysicsObject};
use crate::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HarState {
    #[default]
    Standing,
    Walking,
    Jumping,
    Crouching,
    /// Playing a move from the move table
    Attacking,
    /// Hit-stun, input ignored until it ends
    Stunned,
    /// Cooldown after a move, input ignored until it ends
    Recovering,
    Defeated,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Har {
    /// Player slot (0 or 1)
    pub player: usize,
    pub fighter: FighterId,
    pub health: i32,
    pub max_health: i32,
    pub walk_speed: f32,
    pub jump_speed: f32,
    pub state: HarState,
    pub anim: AnimCursor,
    pub in_air: bool,
    /// Bumped on every stun so a stale end-of-stun effect can be ignored
    pub stun_token: u32,
    /// Bumped on every recovery, same as `stun_token`
    pub recovery_token: u32,
    /// The current move already connected
    pub hit_landed: bool,
    /// The current move already launched its projectile
    pub projectile_fired: bool,
}

impl Har {
    pub fn new(player: usize, fighter: FighterId, assets: &AssetTables) -> Self {
        let (max_health, walk_speed, jump_speed, idle) = match assets.fighter(fighter) {
            Some(f) => (f.max_health, f.walk_speed, f.jump_speed, f.idle_move),
            None => {
                log::warn!("unknown fighter {fighter}, using fallback stats");
                (100, 3.0, 9.0, 0)
            }
        };
        Self {
            player,
            fighter,
            health: max_health,
            max_health,
            walk_speed,
            jump_speed,
            state: HarState::Standing,
            anim: AnimCursor::new(fighter, idle),
            in_air: false,
            stun_token: 0,
            recovery_token: 0,
            hit_landed: false,
            projectile_fired: false,
        }
    }

    /// Accepts new input this tick?
    pub fn can_act(&self) -> bool {
        matches!(
            self.state,
            HarState::Standing | HarState::Walking | HarState::Crouching
        )
    }

    pub fn is_attacking(&self) -> bool {
        self.state == HarState::Attacking
    }

    pub fn is_defeated(&self) -> bool {
        self.state == HarState::Defeated
    }

    fn start_move(&mut self, move_id: MoveId) {
        self.state = HarState::Attacking;
        self.anim = AnimCursor::new(self.fighter, move_id);
        self.hit_landed = false;
        self.projectile_fired = false;
    }

    fn stand(&mut self, assets: &AssetTables) {
        self.state = HarState::Standing;
        let idle = assets.fighter(self.fighter).map_or(0, |f| f.idle_move);
        self.anim.play(idle);
    }
}

/// What a har's per-tick update asks of the game state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarStep {
    /// Launch this projectile from the har
    pub spawn: Option<ProjectileSpec>,
    /// Schedule end of recovery: (ticks, recovery token)
    pub recovery: Option<(u32, u32)>,
}

/// Feed one tick of input to a har
///
/// Returns the move started, if the input triggered one.
pub fn handle_action(obj: &mut PhysicsObject, action: Action, assets: &AssetTables) -> Option<MoveId> {
    let ObjectKind::Har(har) = &mut obj.kind else {
        return None;
    };
    if !har.can_act() {
        return None;
    }
    let fighter = assets.fighter(har.fighter)?;

    if let Some(m) = fighter.match_trigger(action) {
        har.start_move(m.id);
        obj.vel.x = 0.0;
        return Some(m.id);
    }

    let dir = action.horizontal() as f32;
    if action.contains(Action::UP) {
        har.state = HarState::Jumping;
        har.in_air = true;
        har.anim.play(fighter.jump_move);
        obj.vel = Vec2::new(dir * har.walk_speed, -har.jump_speed);
    } else if action.contains(Action::DOWN) {
        har.state = HarState::Crouching;
        har.anim.play(fighter.crouch_move);
        obj.vel.x = 0.0;
    } else if dir != 0.0 {
        har.state = HarState::Walking;
        har.anim.play(fighter.walk_move);
        obj.vel.x = dir * har.walk_speed;
    } else {
        har.state = HarState::Standing;
        har.anim.play(fighter.idle_move);
        obj.vel.x = 0.0;
    }
    None
}

/// Movement, arena constraints and animation for one tick
pub fn har_move(obj: &mut PhysicsObject, assets: &AssetTables) -> HarStep {
    let mut step = HarStep::default();
    let ObjectKind::Har(har) = &mut obj.kind else {
        return step;
    };

    if har.in_air {
        obj.vel.y += obj.gravity;
    }
    obj.pos += obj.vel.round().as_ivec2();

    if obj.pos.y >= ARENA_FLOOR {
        obj.pos.y = ARENA_FLOOR;
        if har.in_air {
            har.in_air = false;
            obj.vel.y = 0.0;
            if har.state == HarState::Jumping {
                obj.vel.x = 0.0;
                har.stand(assets);
            }
        }
    }
    obj.pos.x = obj.pos.x.clamp(ARENA_LEFT_WALL, ARENA_RIGHT_WALL);

    // Knockback slides out on the ground
    if !har.in_air && matches!(har.state, HarState::Stunned | HarState::Recovering | HarState::Defeated) {
        obj.vel.x *= KNOCKBACK_DECAY;
        if obj.vel.x.abs() < 0.5 {
            obj.vel.x = 0.0;
        }
    }

    let finished = har.anim.advance(assets);
    if har.state != HarState::Attacking {
        return step;
    }
    let Some(current) = har.anim.move_def(assets) else {
        har.stand(assets);
        return step;
    };

    if let Some(spec) = &current.projectile {
        if !har.projectile_fired && har.anim.frame >= spec.spawn_frame {
            har.projectile_fired = true;
            step.spawn = Some(spec.clone());
        }
    }

    if finished {
        match current.successor {
            Some(next) => har.start_move(next),
            None if current.recovery_ticks > 0 => {
                har.state = HarState::Recovering;
                har.recovery_token += 1;
                step.recovery = Some((current.recovery_ticks, har.recovery_token));
            }
            None => har.stand(assets),
        }
    }
    step
}

/// Turn to face the opponent, unless mid-move or stunned
pub fn face_toward(obj: &mut PhysicsObject, target_x: i32) {
    let can_turn = obj.har().is_some_and(|h| h.can_act());
    if can_turn && target_x != obj.pos.x {
        obj.facing = Facing::toward(obj.pos.x, target_x);
    }
}

/// Apply a landed hit; returns the stun token to end the stun with
///
/// `from` is the facing of whatever hit the har, so knockback pushes away
/// from it.
pub fn take_hit(
    obj: &mut PhysicsObject,
    damage: i32,
    knockback: Vec2,
    from: Facing,
    lethal: bool,
    assets: &AssetTables,
) -> Option<u32> {
    let ObjectKind::Har(har) = &mut obj.kind else {
        return None;
    };
    if har.is_defeated() {
        return None;
    }

    har.health = if lethal { 0 } else { (har.health - damage).max(0) };
    har.stun_token += 1;
    har.hit_landed = false;
    har.projectile_fired = false;
    har.state = if har.health <= 0 {
        HarState::Defeated
    } else {
        HarState::Stunned
    };
    let stun = assets.fighter(har.fighter).map_or(0, |f| f.stun_move);
    har.anim = AnimCursor::new(har.fighter, stun);
    obj.vel = Vec2::new(knockback.x * from.sign() as f32, knockback.y);
    if knockback.y < 0.0 {
        har.in_air = true;
    }
    Some(har.stun_token)
}

/// End a stun, unless a newer hit has replaced it
pub fn end_stun(obj: &mut PhysicsObject, token: u32, assets: &AssetTables) -> bool {
    match &mut obj.kind {
        ObjectKind::Har(har) if har.state == HarState::Stunned && har.stun_token == token => {
            har.stand(assets);
            true
        }
        _ => false,
    }
}

pub fn end_recovery(obj: &mut PhysicsObject, token: u32, assets: &AssetTables) -> bool {
    match &mut obj.kind {
        ObjectKind::Har(har) if har.state == HarState::Recovering && har.recovery_token == token => {
            har.stand(assets);
            true
        }
        _ => false,
    }
}

/// Where and how fast a har's projectile starts
pub fn launch_point(obj: &PhysicsObject, spec: &ProjectileSpec) -> (IVec2, Vec2) {
    let sign = obj.facing.sign();
    let pos = obj.pos + IVec2::new(spec.offset.x * sign, spec.offset.y);
    let vel = Vec2::new(spec.velocity.x * sign as f32, spec.velocity.y);
    (pos, vel)
}
