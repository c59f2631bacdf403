//! Fixed timestep simulation tick
//!
//! Core game loop that advances simulation deterministically. A tick is a
//! pure function of the previous state and the two players' actions: objects
//! are walked in identity order and all randomness comes from the state's
//! own generator.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::assets::{FighterId, MoveId};
use super::har;
use super::intersect::{intersect_object_object, intersect_sprite_hitpoint};
use super::object::{HardHandler, ObjectId, ObjectKind};
use super::projectile;
use super::state::{GameEvent, GameState, SoundRequest, TimedEffect};
use crate::consts::*;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickInput {
    /// One action set per player slot
    pub actions: [Action; 2],
}

impl TickInput {
    pub fn new(p1: Action, p2: Action) -> Self {
        Self { actions: [p1, p2] }
    }
}

/// A hard collision found during the query pass, applied afterwards
///
/// The striking move is captured at query time; applying an earlier contact
/// may already have knocked the attacker out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Contact {
    attacker: ObjectId,
    target: ObjectId,
    point: IVec2,
    fighter: FighterId,
    move_id: MoveId,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput) {
    apply_input(state, input);
    move_objects(state);
    resolve_soft_collisions(state);
    let contacts = find_contacts(state);
    for contact in contacts {
        apply_contact(state, contact);
    }
    remove_finished(state);
    fire_timers(state);
    state.tick += 1;
}

/// Hand each player's action to their har
fn apply_input(state: &mut GameState, input: &TickInput) {
    let assets = state.shared_assets();
    for player in 0..2 {
        let Some(id) = state.players[player].har else {
            continue;
        };
        let Some(obj) = state.objects.get_mut(&id) else {
            continue;
        };
        let Some(started) = har::handle_action(obj, input.actions[player], &assets) else {
            continue;
        };
        let x = obj.pos.x;
        if let Some(sound) = assets.move_def(obj.har().map_or(0, |h| h.fighter), started).and_then(|m| m.sound) {
            state.emit(GameEvent::Sound(SoundRequest::at(sound, x)));
        }
    }
}

/// Movement and animation for every live object, then facing
fn move_objects(state: &mut GameState) {
    let assets = state.shared_assets();
    let ids: Vec<ObjectId> = state.objects.keys().copied().collect();
    for id in ids {
        let Some(obj) = state.objects.get_mut(&id) else {
            continue;
        };
        match obj.kind {
            ObjectKind::Har(_) => {
                let step = har::har_move(obj, &assets);
                if let Some(spec) = step.spawn {
                    state.spawn_projectile(id, &spec);
                }
                if let Some((ticks, token)) = step.recovery {
                    state.schedule(ticks, TimedEffect::EndRecovery { target: id, token });
                }
            }
            ObjectKind::Projectile(_) => {
                projectile::projectile_move(obj);
                projectile::projectile_animate(obj, &assets);
            }
            ObjectKind::Empty => obj.integrate(),
        }
    }

    // Hars keep facing each other
    let xs = [0, 1].map(|p| state.har_object(p).map(|o| o.pos.x));
    for player in 0..2 {
        let (Some(id), Some(target_x)) = (state.players[player].har, xs[1 - player]) else {
            continue;
        };
        if let Some(obj) = state.objects.get_mut(&id) {
            har::face_toward(obj, target_x);
        }
    }
}

/// Objects in different collision groups can touch (group 0 touches all)
fn groups_collide(a: u8, b: u8) -> bool {
    a == 0 || b == 0 || a != b
}

fn resolve_soft_collisions(state: &mut GameState) {
    let mut pairs = Vec::new();
    let soft: Vec<_> = state.objects.values().filter(|o| o.soft.is_some()).collect();
    for (i, a) in soft.iter().enumerate() {
        for b in &soft[i + 1..] {
            if groups_collide(a.group, b.group) && intersect_object_object(a, b) {
                pairs.push((a.id, b.id));
            }
        }
    }
    for (a, b) in pairs {
        state.separate(a, b);
    }
}

/// Query pass: every attacker frame that connects with a har
fn find_contacts(state: &GameState) -> Vec<Contact> {
    let assets = state.assets();
    let mut contacts = Vec::new();

    for attacker in state.objects.values() {
        let (anim, armed) = match (&attacker.hard, &attacker.kind) {
            (Some(HardHandler::Strike), ObjectKind::Har(h)) => (&h.anim, h.is_attacking() && !h.hit_landed),
            (Some(HardHandler::Impact), ObjectKind::Projectile(p)) => (&p.anim, !p.has_hit()),
            _ => continue,
        };
        if !armed || attacker.finished {
            continue;
        }
        let coords = anim.hit_coords(assets);
        if coords.is_empty() {
            continue;
        }
        let Some(attacker_sprite) = anim.sprite(assets) else {
            continue;
        };

        for target in state.objects.values() {
            if target.id == attacker.id || !groups_collide(attacker.group, target.group) {
                continue;
            }
            let Some(target_har) = target.har() else {
                continue;
            };
            if target_har.is_defeated() {
                continue;
            }
            let Some(target_sprite) = target_har.anim.sprite(assets) else {
                continue;
            };
            if let Some(point) = intersect_sprite_hitpoint(
                attacker,
                attacker_sprite,
                coords.iter().copied(),
                target,
                target_sprite,
                HIT_LEVEL,
            ) {
                contacts.push(Contact {
                    attacker: attacker.id,
                    target: target.id,
                    point,
                    fighter: anim.fighter,
                    move_id: anim.move_id,
                });
            }
        }
    }
    contacts
}

/// Apply one contact; the one-shot flags are re-checked here so an attacker
/// overlapping several times in a tick still only hits once
///
/// Two hars striking each other in the same tick trade hits: both contacts
/// were found against the pre-tick state and both land with the move that
/// was active then.
fn apply_contact(state: &mut GameState, contact: Contact) {
    let assets = state.shared_assets();
    let Some(move_def) = assets.move_def(contact.fighter, contact.move_id) else {
        return;
    };
    let Some(attacker) = state.objects.get_mut(&contact.attacker) else {
        return;
    };
    let facing = attacker.facing;
    let player = match &mut attacker.kind {
        ObjectKind::Har(h) => {
            if h.hit_landed {
                return;
            }
            h.hit_landed = true;
            h.player
        }
        ObjectKind::Projectile(p) => {
            if !p.register_hit() {
                return;
            }
            p.player
        }
        ObjectKind::Empty => return,
    };
    if attacker.projectile().is_some() {
        projectile::projectile_impact(attacker, &assets);
    }

    let lethal = state.rein;
    let Some(target) = state.objects.get_mut(&contact.target) else {
        return;
    };
    let Some(token) = har::take_hit(target, move_def.damage, move_def.knockback, facing, lethal, &assets) else {
        return;
    };
    let defeated = target.har().is_some_and(|h| h.is_defeated());
    let target_player = target.har().map(|h| h.player);

    // Every stun gets an end, whatever the move data says
    if !defeated {
        state.schedule(
            move_def.stun_ticks.max(1),
            TimedEffect::EndStun {
                target: contact.target,
                token,
            },
        );
    }
    match state.players.get_mut(player) {
        Some(scorer) => scorer.score += move_def.damage.max(0) as u32,
        None => log::warn!("tick {}: hit credited to unknown player {}", state.tick, player),
    }
    state.emit(GameEvent::Hit {
        attacker: contact.attacker,
        target: contact.target,
        damage: move_def.damage,
        point: contact.point,
    });
    if let Some(sound) = move_def.sound {
        state.emit(GameEvent::Sound(SoundRequest::at(sound, contact.point.x)));
    }
    if let (true, Some(p)) = (defeated, target_player) {
        log::info!("tick {}: player {} defeated", state.tick, p);
        state.emit(GameEvent::Defeated { player: p });
    }
}

fn remove_finished(state: &mut GameState) {
    let done: Vec<ObjectId> = state
        .objects
        .values()
        .filter(|o| o.finished)
        .map(|o| o.id)
        .collect();
    for id in done {
        state.remove_object(id);
    }
}

fn fire_timers(state: &mut GameState) {
    let assets = state.shared_assets();
    for effect in state.timer.advance() {
        match effect {
            TimedEffect::EndStun { target, token } => {
                if let Some(obj) = state.objects.get_mut(&target) {
                    har::end_stun(obj, token, &assets);
                }
            }
            TimedEffect::EndRecovery { target, token } => {
                if let Some(obj) = state.objects.get_mut(&target) {
                    har::end_recovery(obj, token, &assets);
                }
            }
            TimedEffect::Expire { target } => {
                state.remove_object(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::assets::AssetTables;
    use crate::sim::har::HarState;

    fn new_state() -> GameState {
        GameState::new(7, [0, 1], Arc::new(AssetTables::builtin()))
    }

    fn idle() -> TickInput {
        TickInput::default()
    }

    /// Put the hars `gap` pixels apart in the middle of the arena
    fn close_in(state: &mut GameState, gap: i32) -> (ObjectId, ObjectId) {
        let a = state.players[0].har.unwrap();
        let b = state.players[1].har.unwrap();
        state.object_mut(a).unwrap().pos.x = 140;
        state.object_mut(b).unwrap().pos.x = 140 + gap;
        (a, b)
    }

    #[test]
    fn test_tick_counter_increments() {
        let mut state = new_state();
        for _ in 0..5 {
            tick(&mut state, &idle());
        }
        assert_eq!(state.tick, 5);
        assert_eq!(state.timer.tick(), 5);
    }

    #[test]
    fn test_walking_closes_distance() {
        let mut state = new_state();
        let start = state.har_object(1).unwrap().pos.x - state.har_object(0).unwrap().pos.x;
        for _ in 0..10 {
            tick(&mut state, &TickInput::new(Action::RIGHT, Action::LEFT));
        }
        let gap = state.har_object(1).unwrap().pos.x - state.har_object(0).unwrap().pos.x;
        assert!(gap < start);
    }

    #[test]
    fn test_bodies_never_overlap() {
        let mut state = new_state();
        for _ in 0..60 {
            tick(&mut state, &TickInput::new(Action::RIGHT, Action::LEFT));
        }
        let gap = state.har_object(1).unwrap().pos.x - state.har_object(0).unwrap().pos.x;
        assert!(gap >= 30, "gap {gap}");
    }

    #[test]
    fn test_punch_lands_once_and_stuns() {
        let mut state = new_state();
        let (_, b) = close_in(&mut state, 40);
        tick(&mut state, &TickInput::new(Action::PUNCH, Action::empty()));

        let mut hits = 0;
        for _ in 0..12 {
            tick(&mut state, &idle());
            hits += state
                .drain_events()
                .iter()
                .filter(|e| matches!(e, GameEvent::Hit { .. }))
                .count();
        }
        assert_eq!(hits, 1);
        let target = state.object(b).unwrap().har().unwrap();
        assert_eq!(target.health, 90 - 6);
        assert_eq!(state.players[0].score, 6);
    }

    #[test]
    fn test_simultaneous_punches_trade() {
        let mut state = new_state();
        let (a, b) = close_in(&mut state, 40);
        tick(&mut state, &TickInput::new(Action::PUNCH, Action::PUNCH));

        let mut hits = Vec::new();
        for _ in 0..300 {
            tick(&mut state, &idle());
            for e in state.drain_events() {
                if let GameEvent::Hit { attacker, target, damage, .. } = e {
                    hits.push((attacker, target, damage));
                }
            }
        }
        assert_eq!(hits, vec![(a, b, 6), (b, a, 6)]);
        for id in [a, b] {
            assert_eq!(state.object(id).unwrap().har().unwrap().state, HarState::Standing);
        }
        assert_eq!(state.har(0).unwrap().health, 100 - 6);
        assert_eq!(state.har(1).unwrap().health, 90 - 6);
        assert_eq!([state.players[0].score, state.players[1].score], [6, 6]);
        assert!(state.timer.is_empty());
    }

    #[test]
    fn test_zero_stun_move_still_ends_stun() {
        let mut assets = AssetTables::builtin();
        for fighter in &mut assets.fighters {
            if let Some(punch) = fighter.moves.get_mut(&crate::sim::assets::builtin_moves::PUNCH) {
                punch.stun_ticks = 0;
            }
        }
        let mut state = GameState::new(7, [0, 1], Arc::new(assets));
        let (_, b) = close_in(&mut state, 40);
        tick(&mut state, &TickInput::new(Action::PUNCH, Action::empty()));
        for _ in 0..30 {
            tick(&mut state, &idle());
        }
        let target = state.object(b).unwrap().har().unwrap();
        assert_eq!(target.health, 90 - 6);
        assert_eq!(target.state, HarState::Standing);
    }

    #[test]
    fn test_stun_ends_via_timer() {
        let mut state = new_state();
        let (_, b) = close_in(&mut state, 40);
        tick(&mut state, &TickInput::new(Action::PUNCH, Action::empty()));
        let mut stunned_at = None;
        for t in 0..60 {
            tick(&mut state, &idle());
            let s = state.object(b).unwrap().har().unwrap().state;
            if s == HarState::Stunned && stunned_at.is_none() {
                stunned_at = Some(t);
            }
        }
        assert!(stunned_at.is_some());
        assert_eq!(state.object(b).unwrap().har().unwrap().state, HarState::Standing);
    }

    #[test]
    fn test_rein_makes_hits_lethal() {
        let mut state = new_state();
        state.rein = true;
        close_in(&mut state, 40);
        tick(&mut state, &TickInput::new(Action::PUNCH, Action::empty()));
        let mut defeated = Vec::new();
        for _ in 0..12 {
            tick(&mut state, &idle());
            for e in state.drain_events() {
                if let GameEvent::Defeated { player } = e {
                    defeated.push(player);
                }
            }
        }
        assert_eq!(defeated, vec![1]);
        assert_eq!(state.winner(), Some(0));
    }

    #[test]
    fn test_projectile_hits_at_most_once() {
        let mut state = new_state();
        close_in(&mut state, 120);
        tick(&mut state, &TickInput::new(Action::DOWN | Action::PUNCH, Action::empty()));

        let mut hits = 0;
        for _ in 0..40 {
            tick(&mut state, &idle());
            for e in state.drain_events() {
                if let GameEvent::Hit { attacker, .. } = e {
                    assert_ne!(Some(attacker), state.players[0].har);
                    hits += 1;
                }
            }
        }
        assert_eq!(hits, 1);
        assert_eq!(state.har(1).unwrap().health, 90 - 8);
        // Gone after impact, only the two hars remain
        assert_eq!(state.objects.len(), 2);
    }

    #[test]
    fn test_projectile_ignores_owner() {
        let mut state = new_state();
        let owner = state.players[0].har.unwrap();
        let spec = state
            .assets()
            .move_def(0, crate::sim::assets::builtin_moves::FIREBALL)
            .and_then(|m| m.projectile.clone())
            .unwrap();
        let proj = state.spawn_projectile(owner, &spec).unwrap();
        // Park the projectile on its owner
        let at = state.object(owner).unwrap().pos - IVec2::new(0, 30);
        state.object_mut(proj).unwrap().pos = at;
        state.object_mut(proj).unwrap().vel = glam::Vec2::ZERO;
        tick(&mut state, &idle());
        assert_eq!(state.har(0).unwrap().health, 100);
        assert!(!state.object(proj).unwrap().projectile().unwrap().has_hit());
    }

    #[test]
    fn test_projectile_expires() {
        let mut state = new_state();
        let owner = state.players[0].har.unwrap();
        let mut spec = state
            .assets()
            .move_def(0, crate::sim::assets::builtin_moves::FIREBALL)
            .and_then(|m| m.projectile.clone())
            .unwrap();
        spec.lifetime = 3;
        spec.velocity = glam::Vec2::ZERO;
        let proj = state.spawn_projectile(owner, &spec).unwrap();
        state.object_mut(proj).unwrap().pos.y = 20;
        for _ in 0..2 {
            tick(&mut state, &idle());
        }
        assert!(state.object(proj).is_some());
        tick(&mut state, &idle());
        assert!(state.object(proj).is_none());
    }

    #[test]
    fn test_same_inputs_same_state() {
        let inputs = [
            TickInput::new(Action::RIGHT, Action::LEFT),
            TickInput::new(Action::PUNCH, Action::KICK),
            TickInput::new(Action::DOWN | Action::PUNCH, Action::UP),
        ];
        let mut a = new_state();
        let mut b = new_state();
        for i in 0..120 {
            let input = inputs[i % inputs.len()];
            tick(&mut a, &input);
            tick(&mut b, &input);
        }
        assert_eq!(a.objects, b.objects);
        assert_eq!(a.timer, b.timer);
        assert_eq!(a.players, b.players);
    }
}
