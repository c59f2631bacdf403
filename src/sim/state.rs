//! Game state and core simulation types
//!
//! Everything that must match between two peers for a given tick lives here.
//! The asset tables ride along behind an `Arc` and are never serialized.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::anim::AnimCursor;
use super::assets::{AssetTables, FighterId, ProjectileSpec};
use super::har::{self, Har};
use super::object::{Facing, HardHandler, ObjectId, ObjectKind, PhysicsObject, Shape, SoftHandler};
use super::projectile::Projectile;
use super::random::GameRng;
use super::ticktimer::TickTimer;
use crate::consts::*;
use crate::error::SnapshotError;

/// Network role of the local peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetMode {
    #[default]
    None,
    Client,
    Server,
}

impl NetMode {
    pub fn is_networked(self) -> bool {
        self != NetMode::None
    }
}

/// Round flow, advanced by the arena after each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Intro; inputs are ignored
    #[default]
    Starting,
    Fighting,
    /// A har is down; inputs are ignored until the next round
    Ending,
}

/// One of the two player slots
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Player {
    pub fighter: FighterId,
    /// The player's har, if one is in the arena
    pub har: Option<ObjectId>,
    pub score: u32,
    pub wins: u8,
}

/// Deferred effect fired by the tick timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimedEffect {
    /// End hit-stun, if `token` still matches the har's latest stun
    EndStun { target: ObjectId, token: u32 },
    /// End move recovery, if `token` still matches the har's latest one
    EndRecovery { target: ObjectId, token: u32 },
    /// Projectile lifetime ran out
    Expire { target: ObjectId },
}

/// Fire-and-forget sound playback request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundRequest {
    pub id: u16,
    /// 0.0 to 1.0
    pub volume: f32,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f32,
    /// Playback rate multiplier
    pub pitch: f32,
}

impl SoundRequest {
    /// Sound panned to where it happened in the arena
    pub fn at(id: u16, x: i32) -> Self {
        let span = (ARENA_RIGHT_WALL - ARENA_LEFT_WALL) as f32;
        let pan = ((x - ARENA_LEFT_WALL) as f32 / span * 2.0 - 1.0).clamp(-1.0, 1.0);
        Self {
            id,
            volume: 1.0,
            pan,
            pitch: 1.0,
        }
    }
}

/// Something that happened during a tick, for the non-deterministic edges
/// (audio, render effects, match flow) to react to
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Sound(SoundRequest),
    Hit {
        attacker: ObjectId,
        target: ObjectId,
        damage: i32,
        point: IVec2,
    },
    Spawned(ObjectId),
    Removed(ObjectId),
    Defeated { player: usize },
}

/// Complete world state for one tick (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Ticks simulated so far
    pub tick: u64,
    /// Local peer identity (0 locally and on the server, 1 on a client)
    pub this_id: u8,
    /// Next object identity to hand out
    next_id: ObjectId,
    pub net_mode: NetMode,
    pub players: [Player; 2],
    pub phase: MatchPhase,
    /// Ticks spent in the current phase
    pub phase_ticks: u32,
    /// Live objects, iterated in identity order
    pub objects: BTreeMap<ObjectId, PhysicsObject>,
    pub timer: TickTimer<TimedEffect>,
    pub rng: GameRng,
    /// Debug: every hit is lethal
    pub rein: bool,
    /// Events from the last tick (not part of the hashed state)
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    #[serde(skip)]
    assets: Arc<AssetTables>,
}

impl GameState {
    /// Fresh round with both hars placed at their start positions
    pub fn new(seed: u64, fighters: [FighterId; 2], assets: Arc<AssetTables>) -> Self {
        let mut state = Self {
            tick: 0,
            this_id: 0,
            next_id: 1,
            net_mode: NetMode::None,
            players: fighters.map(|fighter| Player {
                fighter,
                ..Default::default()
            }),
            phase: MatchPhase::Starting,
            phase_ticks: 0,
            objects: BTreeMap::new(),
            timer: TickTimer::new(),
            rng: GameRng::new(seed),
            rein: false,
            events: Vec::new(),
            assets,
        };
        for player in 0..2 {
            state.spawn_har(player);
        }
        state
    }

    /// Clear the arena and place both hars for a new round
    ///
    /// Scores, wins, the tick counter and identity allocation carry over.
    pub fn start_round(&mut self) {
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for id in ids {
            self.remove_object(id);
        }
        self.timer.clear();
        for player in 0..2 {
            self.spawn_har(player);
        }
        self.phase = MatchPhase::Starting;
        self.phase_ticks = 0;
    }

    pub fn assets(&self) -> &AssetTables {
        &self.assets
    }

    pub fn shared_assets(&self) -> Arc<AssetTables> {
        Arc::clone(&self.assets)
    }

    /// Re-attach asset tables after deserializing
    pub fn attach_assets(&mut self, assets: Arc<AssetTables>) {
        self.assets = assets;
    }

    /// Check the cross references of a state that came from elsewhere
    ///
    /// A state built by [`GameState::new`] and advanced by the tick always
    /// passes; a decoded one may not.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for (&key, obj) in &self.objects {
            if obj.id != key {
                return Err(SnapshotError::IdMismatch { key, id: obj.id });
            }
            if key >= self.next_id {
                return Err(SnapshotError::IdAhead {
                    id: key,
                    next_id: self.next_id,
                });
            }
            let player = match &obj.kind {
                ObjectKind::Har(h) => h.player,
                ObjectKind::Projectile(p) => {
                    if let Some(owner) = p.owner.filter(|o| !self.objects.contains_key(o)) {
                        return Err(SnapshotError::MissingOwner { id: key, owner });
                    }
                    p.player
                }
                ObjectKind::Empty => continue,
            };
            if player >= self.players.len() {
                return Err(SnapshotError::NoSuchPlayer { id: key, player });
            }
        }
        for (player, slot) in self.players.iter().enumerate() {
            let Some(id) = slot.har else {
                continue;
            };
            match self.objects.get(&id).and_then(PhysicsObject::har) {
                None => return Err(SnapshotError::MissingHar { player, id }),
                Some(h) if h.player != player => {
                    return Err(SnapshotError::WrongSlot {
                        player,
                        id,
                        owner: h.player,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn next_id(&self) -> ObjectId {
        self.next_id
    }

    fn alloc_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert an object under a freshly allocated identity
    pub fn add_object(&mut self, mut obj: PhysicsObject) -> ObjectId {
        let id = self.alloc_id();
        obj.id = id;
        if let Some(shape) = obj.shape.as_ref().filter(|s| obj.can_collide && s.is_degenerate()) {
            log::warn!("object {id} has a degenerate shape {shape:?}, it will not collide");
        }
        self.objects.insert(id, obj);
        self.events.push(GameEvent::Spawned(id));
        id
    }

    /// Remove and free an object, clearing every weak reference to it
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let Some(mut obj) = self.objects.remove(&id) else {
            return false;
        };
        obj.free();
        for other in self.objects.values_mut() {
            if let Some(proj) = other.projectile_mut() {
                if proj.owner == Some(id) {
                    proj.owner = None;
                }
            }
        }
        for player in &mut self.players {
            if player.har == Some(id) {
                player.har = None;
            }
        }
        self.events.push(GameEvent::Removed(id));
        true
    }

    pub fn object(&self, id: ObjectId) -> Option<&PhysicsObject> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut PhysicsObject> {
        self.objects.get_mut(&id)
    }

    /// The player's har object
    pub fn har_object(&self, player: usize) -> Option<&PhysicsObject> {
        self.players
            .get(player)
            .and_then(|p| p.har)
            .and_then(|id| self.objects.get(&id))
    }

    pub fn har(&self, player: usize) -> Option<&Har> {
        self.har_object(player).and_then(|o| o.har())
    }

    /// Place a new har for `player` at its start position
    pub fn spawn_har(&mut self, player: usize) -> ObjectId {
        if let Some(old) = self.players[player].har {
            self.remove_object(old);
        }
        let fighter = self.players[player].fighter;
        let body = self
            .assets
            .fighter(fighter)
            .map_or(IVec2::new(30, 60), |f| f.body);
        let facing = if player == 0 { Facing::Right } else { Facing::Left };

        let mut obj = PhysicsObject::create(HAR_START_X[player], ARENA_FLOOR, 0.0, 0.0, true)
            .with_shape(Shape::body(body))
            .with_handlers(Some(SoftHandler::Push), Some(HardHandler::Strike))
            .with_kind(ObjectKind::Har(Box::new(Har::new(player, fighter, &self.assets))));
        obj.gravity = HAR_GRAVITY;
        obj.facing = facing;
        obj.group = player as u8 + 1;

        let id = self.add_object(obj);
        self.players[player].har = Some(id);
        id
    }

    /// Launch a projectile from an existing object (normally a har)
    pub fn spawn_projectile(&mut self, owner: ObjectId, spec: &ProjectileSpec) -> Option<ObjectId> {
        let caster = self.objects.get(&owner)?;
        let (pos, vel) = har::launch_point(caster, spec);
        let (player, fighter) = match caster.har() {
            Some(h) => (h.player, h.fighter),
            None => (0, 0),
        };
        let facing = caster.facing;
        let group = caster.group;

        let anim = AnimCursor::new(fighter, spec.move_id);
        let shape = anim
            .sprite(&self.assets)
            .map(|s| Shape::Rect {
                offset: s.offset,
                size: s.size(),
            })
            .unwrap_or(Shape::Point { offset: IVec2::ZERO });

        let mut obj = PhysicsObject::create(pos.x, pos.y, vel.x, vel.y, true)
            .with_shape(shape)
            .with_handlers(None, Some(HardHandler::Impact))
            .with_kind(ObjectKind::Projectile(Box::new(Projectile::new(
                owner,
                player,
                anim,
                spec.options,
            ))));
        obj.gravity = spec.gravity;
        obj.facing = facing;
        obj.group = group;

        let id = self.add_object(obj);
        if spec.lifetime > 0 {
            self.timer
                .schedule(spec.lifetime as i64, TimedEffect::Expire { target: id });
        }
        log::debug!("tick {}: projectile {id} launched by {owner}", self.tick);
        Some(id)
    }

    /// Queue a deferred effect `delay` ticks from now
    pub fn schedule(&mut self, delay: u32, effect: TimedEffect) -> u64 {
        self.timer.schedule(delay as i64, effect)
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Index of the player whose har is still standing, once the other is down
    pub fn winner(&self) -> Option<usize> {
        let down = |p: usize| self.har(p).is_none_or(|h| h.is_defeated());
        match (down(0), down(1)) {
            (false, true) => Some(0),
            (true, false) => Some(1),
            _ => None,
        }
    }

    /// Either har has been defeated
    pub fn round_over(&self) -> bool {
        (0..2).any(|p| self.har(p).is_none_or(|h| h.is_defeated()))
    }

    /// Push two overlapping bodies apart horizontally
    pub(super) fn separate(&mut self, a: ObjectId, b: ObjectId) {
        let (Some(pa), Some(pb)) = (self.objects.get(&a), self.objects.get(&b)) else {
            return;
        };
        let (ax, bx) = (pa.pos.x, pb.pos.x);
        let width = |o: &PhysicsObject| match o.shape {
            Some(Shape::Rect { size, .. }) => size.x,
            _ => 0,
        };
        let min_dist = (width(pa) + width(pb)) / 2 + 1;
        let overlap = min_dist - (ax - bx).abs();
        if overlap <= 0 {
            return;
        }
        // Ties push the lower identity left
        let dir = if ax <= bx { -1 } else { 1 };
        let push_a = overlap / 2 + overlap % 2;
        let push_b = overlap / 2;
        if let Some(o) = self.objects.get_mut(&a) {
            o.pos.x = (o.pos.x + dir * push_a).clamp(ARENA_LEFT_WALL, ARENA_RIGHT_WALL);
        }
        if let Some(o) = self.objects.get_mut(&b) {
            o.pos.x = (o.pos.x - dir * push_b).clamp(ARENA_LEFT_WALL, ARENA_RIGHT_WALL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::assets::builtin_moves;

    fn new_state() -> GameState {
        GameState::new(42, [0, 1], Arc::new(AssetTables::builtin()))
    }

    #[test]
    fn test_new_state_has_two_hars() {
        let state = new_state();
        assert_eq!(state.objects.len(), 2);
        assert_eq!(state.players[0].har, Some(1));
        assert_eq!(state.players[1].har, Some(2));
        assert_eq!(state.next_id(), 3);
        assert_eq!(state.har_object(1).unwrap().facing, Facing::Left);
    }

    #[test]
    fn test_fresh_and_ticked_states_validate() {
        let mut state = new_state();
        assert_eq!(state.validate(), Ok(()));
        let owner = state.players[0].har.unwrap();
        let spec = state
            .assets()
            .move_def(0, builtin_moves::FIREBALL)
            .and_then(|m| m.projectile.clone())
            .unwrap();
        state.spawn_projectile(owner, &spec).unwrap();
        state.start_round();
        assert_eq!(state.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_broken_links() {
        let mut bad_player = new_state();
        bad_player.object_mut(2).unwrap().har_mut().unwrap().player = 7;
        assert_eq!(
            bad_player.validate(),
            Err(SnapshotError::NoSuchPlayer { id: 2, player: 7 })
        );

        let mut dangling = new_state();
        dangling.players[1].har = Some(40);
        assert_eq!(
            dangling.validate(),
            Err(SnapshotError::MissingHar { player: 1, id: 40 })
        );

        let mut swapped = new_state();
        swapped.players.swap(0, 1);
        assert!(matches!(swapped.validate(), Err(SnapshotError::WrongSlot { player: 0, .. })));

        let mut ahead = new_state();
        ahead.next_id = 2;
        assert_eq!(ahead.validate(), Err(SnapshotError::IdAhead { id: 2, next_id: 2 }));
    }

    #[test]
    fn test_degenerate_object_never_collides() {
        let mut state = new_state();
        let har_pos = state.har_object(0).unwrap().pos;
        let obj = PhysicsObject::create(har_pos.x, har_pos.y, 0.0, 0.0, true)
            .with_shape(Shape::Rect {
                offset: IVec2::new(-15, -60),
                size: IVec2::new(30, 0),
            })
            .with_handlers(Some(SoftHandler::Push), None);
        let id = state.add_object(obj);
        for _ in 0..3 {
            crate::sim::tick(&mut state, &crate::sim::TickInput::default());
        }
        assert_eq!(state.object(id).unwrap().pos, har_pos);
        assert_eq!(state.har_object(0).unwrap().pos, har_pos);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut state = new_state();
        let a = state.add_object(PhysicsObject::create(0, 0, 0.0, 0.0, false));
        assert!(state.remove_object(a));
        let b = state.add_object(PhysicsObject::create(0, 0, 0.0, 0.0, false));
        assert!(b > a);
        assert!(!state.remove_object(a));
    }

    #[test]
    fn test_removing_owner_clears_projectile_owner() {
        let mut state = new_state();
        let owner = state.players[0].har.unwrap();
        let spec = state
            .assets()
            .move_def(0, builtin_moves::FIREBALL)
            .and_then(|m| m.projectile.clone())
            .unwrap();
        let proj = state.spawn_projectile(owner, &spec).unwrap();
        assert_eq!(state.object(proj).unwrap().group, 1);

        state.remove_object(owner);
        assert_eq!(state.players[0].har, None);
        assert_eq!(state.object(proj).unwrap().projectile().unwrap().owner, None);
    }

    #[test]
    fn test_projectile_expiry_scheduled() {
        let mut state = new_state();
        let owner = state.players[0].har.unwrap();
        let spec = state
            .assets()
            .move_def(0, builtin_moves::FIREBALL)
            .and_then(|m| m.projectile.clone())
            .unwrap();
        let proj = state.spawn_projectile(owner, &spec).unwrap();
        let pending: Vec<_> = state.timer.pending().map(|e| (e.target, e.data)).collect();
        assert_eq!(pending, vec![(90, TimedEffect::Expire { target: proj })]);
    }

    #[test]
    fn test_separate_pushes_apart() {
        let mut state = new_state();
        let (a, b) = (state.players[0].har.unwrap(), state.players[1].har.unwrap());
        state.object_mut(a).unwrap().pos.x = 150;
        state.object_mut(b).unwrap().pos.x = 160;
        state.separate(a, b);
        let (ax, bx) = (state.object(a).unwrap().pos.x, state.object(b).unwrap().pos.x);
        assert!(bx - ax >= 31);
        assert!(ax < 150 && bx > 160);
    }

    #[test]
    fn test_snapshot_roundtrip_needs_assets() {
        let state = new_state();
        let json = serde_json::to_string(&state).unwrap();
        let mut restored: GameState = serde_json::from_str(&json).unwrap();
        assert!(restored.assets().fighters.is_empty());
        restored.attach_assets(state.shared_assets());
        assert_eq!(restored.objects, state.objects);
        assert_eq!(restored.next_id(), state.next_id());
    }

    #[test]
    fn test_start_round_keeps_scores_and_ids() {
        let mut state = new_state();
        state.players[0].score = 30;
        state.players[1].wins = 1;
        state.phase = MatchPhase::Ending;
        state.start_round();
        assert_eq!(state.objects.len(), 2);
        assert_eq!(state.players[0].har, Some(3));
        assert_eq!(state.players[1].har, Some(4));
        assert_eq!(state.players[0].score, 30);
        assert_eq!(state.players[1].wins, 1);
        assert_eq!(state.phase, MatchPhase::Starting);
        assert!(state.timer.is_empty());
    }

    #[test]
    fn test_sound_pan_follows_position() {
        assert_eq!(SoundRequest::at(1, ARENA_LEFT_WALL).pan, -1.0);
        assert_eq!(SoundRequest::at(1, ARENA_RIGHT_WALL).pan, 1.0);
    }
}
