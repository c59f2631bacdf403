//! Match driver
//!
//! Owns the game state, the two controller slots and, in netplay, the
//! lockstep session. One call to [`Arena::step`] simulates at most one tick:
//! it polls each controller once, masks input outside the fighting phase,
//! runs [`sim::tick`], advances the round flow and hashes the result.
//!
//! In a networked match the step refuses to run a tick whose remote input has
//! not arrived and reports [`StepOutcome::Waiting`] instead. A desync or a
//! lost connection halts the match until [`Arena::reset`] or a resync.

use std::sync::Arc;
use std::time::Instant;

use crate::consts::{ROUND_END_TICKS, ROUND_START_TICKS};
use crate::controller::{Controller, InputEvent, RemoteController};
use crate::error::{ArenaError, NetError};
use crate::net::{NetRole, NetSession};
use crate::render::RenderSnapshot;
use crate::sim::{
    self, Action, AssetTables, FighterId, GameEvent, GameState, MatchPhase, TickInput,
};

/// Debug hook: sees every polled action and may replace it
pub type ControllerHook = Box<dyn FnMut(usize, Action) -> Action>;

/// Result of one [`Arena::step`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A tick was simulated; `hash` covers the state after it
    Stepped { tick: u64, hash: u32 },
    /// Remote data for the next tick is missing
    Waiting,
}

pub struct Arena {
    state: GameState,
    assets: Arc<AssetTables>,
    seed: u64,
    fighters: [FighterId; 2],
    controllers: [Option<Controller>; 2],
    session: Option<NetSession>,
    hooks: Vec<ControllerHook>,
    /// Reason play is stopped, if it is
    halted: Option<String>,
    last_hash: u32,
}

impl Arena {
    pub fn new(seed: u64, fighters: [FighterId; 2], assets: Arc<AssetTables>) -> Self {
        let state = GameState::new(seed, fighters, Arc::clone(&assets));
        let last_hash = sim::state_hash(&state);
        log::info!("arena ready (seed {seed}, fighters {fighters:?})");
        Self {
            state,
            assets,
            seed,
            fighters,
            controllers: [None, None],
            session: None,
            hooks: Vec::new(),
            halted: None,
            last_hash,
        }
    }

    pub fn set_controller(&mut self, player: usize, controller: Controller) -> Result<(), ArenaError> {
        let slot = self
            .controllers
            .get_mut(player)
            .ok_or(ArenaError::NoSuchPlayer(player))?;
        log::debug!("player {player} driven by {}", controller.name());
        *slot = Some(controller);
        Ok(())
    }

    pub fn controller(&self, player: usize) -> Option<&Controller> {
        self.controllers.get(player).and_then(Option::as_ref)
    }

    /// Turn this arena into one end of a lockstep match
    ///
    /// The peer's slot gets a [`RemoteController`]; debug features are
    /// switched off since they would only apply on one side.
    pub fn connect(&mut self, session: NetSession) {
        let role = session.role();
        self.state.net_mode = role.mode();
        self.state.this_id = role.local_player() as u8;
        self.state.rein = false;
        self.hooks.clear();
        self.controllers[role.remote_player()] = Some(Controller::Remote(RemoteController::new()));
        self.session = Some(session);
        self.last_hash = sim::state_hash(&self.state);
        log::info!("netplay as {role:?}, local player {}", role.local_player());
    }

    pub fn is_networked(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Hash of the current state
    pub fn state_hash(&self) -> u32 {
        self.last_hash
    }

    /// Full copy of the current state, suitable for [`Arena::resync`]
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    pub fn render_snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::capture(&self.state)
    }

    /// Events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.drain_events()
    }

    /// Offer a device event to the controllers; true if one consumed it
    pub fn handle_event(&mut self, event: &InputEvent) -> bool {
        self.controllers
            .iter_mut()
            .flatten()
            .any(|controller| controller.handle(event))
    }

    /// Start the match over from tick 0 with the configured seed
    pub fn reset(&mut self) {
        let mut state = GameState::new(self.seed, self.fighters, Arc::clone(&self.assets));
        state.this_id = self.state.this_id;
        state.net_mode = self.state.net_mode;
        self.state = state;
        self.halted = None;
        for controller in self.controllers.iter_mut().flatten() {
            controller.free();
        }
        if let Some(session) = self.session.as_mut() {
            session.rebase(0);
        }
        self.last_hash = sim::state_hash(&self.state);
        log::info!("arena reset, hash {:#010x}", self.last_hash);
    }

    /// Continue from a captured state, clearing any halt
    ///
    /// A snapshot with broken object links is refused and the current
    /// state kept.
    pub fn resync(&mut self, snapshot: GameState) -> Result<(), ArenaError> {
        snapshot.validate()?;
        self.install(snapshot);
        if let Some(session) = self.session.as_mut() {
            session.rebase(self.state.tick);
        }
        Ok(())
    }

    /// Server: push the current state to the client for it to resync from
    pub fn publish_resync(&mut self) -> Result<(), ArenaError> {
        let Some(session) = self.session.as_mut() else {
            return Err(ArenaError::Refused("resync without a session"));
        };
        if session.role() != NetRole::Server {
            return Err(ArenaError::Refused("resync from a client"));
        }
        log::info!("sending resync snapshot for tick {}", self.state.tick);
        session.send_resync(&self.state)?;
        Ok(())
    }

    /// Debug: make every hit lethal. Returns the new setting
    pub fn toggle_rein(&mut self) -> Result<bool, ArenaError> {
        if self.is_networked() {
            return Err(ArenaError::Refused("rein"));
        }
        self.state.rein = !self.state.rein;
        log::info!("rein {}", if self.state.rein { "on" } else { "off" });
        Ok(self.state.rein)
    }

    /// Debug: observe or rewrite polled actions
    pub fn add_hook(&mut self, hook: ControllerHook) -> Result<(), ArenaError> {
        if self.is_networked() {
            return Err(ArenaError::Refused("controller hooks"));
        }
        self.hooks.push(hook);
        Ok(())
    }

    pub fn step(&mut self) -> Result<StepOutcome, ArenaError> {
        self.step_at(Instant::now())
    }

    /// Step with an explicit clock reading (used for the netplay timeout)
    pub fn step_at(&mut self, now: Instant) -> Result<StepOutcome, ArenaError> {
        let Some(mut session) = self.session.take() else {
            if let Some(reason) = &self.halted {
                return Err(ArenaError::Halted(reason.clone()));
            }
            let actions = [self.poll(0), self.poll(1)];
            let actions = self.apply_hooks(actions);
            let tick = self.state.tick;
            let hash = self.advance(actions);
            return Ok(StepOutcome::Stepped { tick, hash });
        };
        let result = self.lockstep(&mut session, now);
        self.session = Some(session);
        if let Err(ArenaError::Net(err)) = &result {
            self.halt(err);
        }
        result
    }

    fn lockstep(&mut self, session: &mut NetSession, now: Instant) -> Result<StepOutcome, ArenaError> {
        let role = session.role();
        let local = role.local_player();
        let remote = role.remote_player();

        match self.controllers[remote].as_mut() {
            Some(Controller::Remote(queue)) => session.pump(queue)?,
            _ => return Err(ArenaError::NoController(remote)),
        }
        if let Some(snapshot) = session.take_resync() {
            self.install(*snapshot);
            session.rebase(self.state.tick);
        }
        if let Some(reason) = &self.halted {
            return Err(ArenaError::Halted(reason.clone()));
        }

        let tick = self.state.tick;
        match role {
            NetRole::Server => {
                if !self.controllers[remote].as_ref().is_some_and(|c| c.ready(tick)) {
                    session.wait(tick, now)?;
                    return Ok(StepOutcome::Waiting);
                }
                session.arrived();
                let mut inputs = [Action::empty(); 2];
                inputs[local] = self.poll(local);
                inputs[remote] = self.poll(remote);
                let hash = self.advance(inputs);
                session.publish(tick, hash, inputs)?;
                Ok(StepOutcome::Stepped { tick, hash })
            }
            NetRole::Client => {
                if session.sent_input(tick).is_none() {
                    let action = self.poll(local);
                    session.send_input(tick, action)?;
                }
                let Some(inputs) = session.canonical_inputs(tick) else {
                    session.wait(tick, now)?;
                    return Ok(StepOutcome::Waiting);
                };
                session.arrived();
                // Keep the remote queue pruned; the canonical record wins
                if let Some(Controller::Remote(queue)) = self.controllers[remote].as_mut() {
                    queue.tick(tick);
                }
                let hash = self.advance(inputs);
                session.verify(tick, hash)?;
                Ok(StepOutcome::Stepped { tick, hash })
            }
        }
    }

    /// Poll one slot's controller exactly once
    fn poll(&mut self, player: usize) -> Action {
        match self.controllers[player].as_mut() {
            Some(controller) => controller.tick(&self.state),
            None => Action::empty(),
        }
    }

    fn apply_hooks(&mut self, mut actions: [Action; 2]) -> [Action; 2] {
        for hook in &mut self.hooks {
            for (player, action) in actions.iter_mut().enumerate() {
                *action = hook(player, *action);
            }
        }
        actions
    }

    /// Simulate one tick with the given actions and hash the result
    fn advance(&mut self, actions: [Action; 2]) -> u32 {
        let input = if self.state.phase == MatchPhase::Fighting {
            TickInput { actions }
        } else {
            TickInput::default()
        };
        sim::tick(&mut self.state, &input);
        advance_phase(&mut self.state);
        self.last_hash = sim::state_hash(&self.state);
        self.last_hash
    }

    fn install(&mut self, mut snapshot: GameState) {
        snapshot.attach_assets(Arc::clone(&self.assets));
        snapshot.this_id = self.state.this_id;
        snapshot.net_mode = self.state.net_mode;
        snapshot.events.clear();
        self.state = snapshot;
        self.halted = None;
        self.last_hash = sim::state_hash(&self.state);
        log::info!(
            "resynced to tick {}, hash {:#010x}",
            self.state.tick,
            self.last_hash
        );
    }

    fn halt(&mut self, err: &NetError) {
        log::error!("halting match at tick {}: {err}", self.state.tick);
        self.halted = Some(err.to_string());
    }
}

/// Round flow: intro, fight until a knockout, pause, next round
fn advance_phase(state: &mut GameState) {
    match state.phase {
        MatchPhase::Starting => {
            state.phase_ticks += 1;
            if state.phase_ticks >= ROUND_START_TICKS {
                state.phase = MatchPhase::Fighting;
                state.phase_ticks = 0;
                log::info!("fight! (tick {})", state.tick);
            }
        }
        MatchPhase::Fighting => {
            if state.round_over() {
                if let Some(winner) = state.winner() {
                    let wins = &mut state.players[winner].wins;
                    *wins = wins.saturating_add(1);
                    log::info!("player {winner} takes the round (tick {})", state.tick);
                }
                state.phase = MatchPhase::Ending;
                state.phase_ticks = 0;
            }
        }
        MatchPhase::Ending => {
            state.phase_ticks += 1;
            if state.phase_ticks >= ROUND_END_TICKS {
                state.start_round();
                log::info!("next round (tick {})", state.tick);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::controller::{AiController, KeyboardController, Keymap, PilotProfile};
    use crate::error::SnapshotError;
    use crate::net::{ChannelTransport, DEFAULT_TIMEOUT};
    use crate::sim::HarState;

    fn new_arena() -> Arena {
        Arena::new(7, [0, 1], Arc::new(AssetTables::builtin()))
    }

    fn run_to_fight(arena: &mut Arena) {
        for _ in 0..ROUND_START_TICKS {
            arena.step().unwrap();
        }
        assert_eq!(arena.phase(), MatchPhase::Fighting);
    }

    fn knock_out(arena: &mut Arena, player: usize) {
        let id = arena.state.players[player].har.unwrap();
        let har = arena.state.object_mut(id).unwrap().har_mut().unwrap();
        har.health = 0;
        har.state = HarState::Defeated;
    }

    fn networked_pair() -> (Arena, Arena) {
        let (a, b) = ChannelTransport::pair();
        let mut server = new_arena();
        let mut client = new_arena();
        server
            .set_controller(0, Controller::Ai(AiController::new(1, 0, PilotProfile::default(), 3)))
            .unwrap();
        client
            .set_controller(1, Controller::Ai(AiController::new(2, 1, PilotProfile::default(), 3)))
            .unwrap();
        server.connect(NetSession::new(NetRole::Server, Box::new(a), DEFAULT_TIMEOUT));
        client.connect(NetSession::new(NetRole::Client, Box::new(b), DEFAULT_TIMEOUT));
        (server, client)
    }

    /// Alternate the two peers until both have simulated `ticks` ticks
    fn run_pair(server: &mut Arena, client: &mut Arena, ticks: u64) -> Vec<(u32, u32)> {
        let mut server_hashes = Vec::new();
        let mut client_hashes = Vec::new();
        for _ in 0..ticks * 4 {
            if client.state().tick < ticks {
                if let StepOutcome::Stepped { hash, .. } = client.step().unwrap() {
                    client_hashes.push(hash);
                }
            }
            if server.state().tick < ticks {
                if let StepOutcome::Stepped { hash, .. } = server.step().unwrap() {
                    server_hashes.push(hash);
                }
            }
            if server.state().tick >= ticks && client.state().tick >= ticks {
                break;
            }
        }
        server_hashes.into_iter().zip(client_hashes).collect()
    }

    #[test]
    fn test_intro_ignores_input() {
        let mut arena = new_arena();
        arena
            .set_controller(0, Controller::Keyboard(KeyboardController::new(Keymap::player_one())))
            .unwrap();
        let x0 = arena.state().har_object(0).unwrap().pos.x;
        assert!(arena.handle_event(&InputEvent::KeyDown {
            scancode: Keymap::player_one().right
        }));
        for _ in 0..10 {
            arena.step().unwrap();
        }
        assert_eq!(arena.phase(), MatchPhase::Starting);
        assert_eq!(arena.state().har_object(0).unwrap().pos.x, x0);
    }

    #[test]
    fn test_fight_accepts_input() {
        let mut arena = new_arena();
        arena
            .set_controller(0, Controller::Keyboard(KeyboardController::new(Keymap::player_one())))
            .unwrap();
        run_to_fight(&mut arena);
        let x0 = arena.state().har_object(0).unwrap().pos.x;
        arena.handle_event(&InputEvent::KeyDown {
            scancode: Keymap::player_one().right,
        });
        for _ in 0..5 {
            arena.step().unwrap();
        }
        assert!(arena.state().har_object(0).unwrap().pos.x > x0);
    }

    #[test]
    fn test_knockout_ends_round_and_restarts() {
        let mut arena = new_arena();
        run_to_fight(&mut arena);
        knock_out(&mut arena, 1);
        arena.step().unwrap();
        assert_eq!(arena.phase(), MatchPhase::Ending);
        assert_eq!(arena.state().players[0].wins, 1);

        for _ in 0..ROUND_END_TICKS {
            arena.step().unwrap();
        }
        assert_eq!(arena.phase(), MatchPhase::Starting);
        assert_eq!(arena.state().players[0].wins, 1);
        assert!(arena.state().har(1).is_some_and(|h| !h.is_defeated()));
    }

    #[test]
    fn test_reset_returns_to_start() {
        let mut arena = new_arena();
        let initial = arena.state_hash();
        run_to_fight(&mut arena);
        assert_ne!(arena.state_hash(), initial);
        arena.reset();
        assert_eq!(arena.state().tick, 0);
        assert_eq!(arena.phase(), MatchPhase::Starting);
        assert_eq!(arena.state_hash(), initial);
    }

    #[test]
    fn test_resync_restores_snapshot() {
        let mut arena = new_arena();
        for _ in 0..20 {
            arena.step().unwrap();
        }
        let snapshot = arena.snapshot();
        let hash = arena.state_hash();
        for _ in 0..20 {
            arena.step().unwrap();
        }
        arena.resync(snapshot).unwrap();
        assert_eq!(arena.state().tick, 20);
        assert_eq!(arena.state_hash(), hash);
    }

    #[test]
    fn test_resync_refuses_broken_snapshot() {
        let mut arena = new_arena();
        arena.step().unwrap();
        let hash = arena.state_hash();
        let mut snapshot = arena.snapshot();
        snapshot.players[0].har = Some(99);
        assert!(matches!(
            arena.resync(snapshot),
            Err(ArenaError::Snapshot(SnapshotError::MissingHar { player: 0, id: 99 }))
        ));
        assert_eq!(arena.state().tick, 1);
        assert_eq!(arena.state_hash(), hash);
    }

    #[test]
    fn test_set_controller_checks_slot() {
        let mut arena = new_arena();
        let ai = || Controller::Ai(AiController::new(1, 0, PilotProfile::default(), 3));
        assert!(matches!(
            arena.set_controller(2, ai()),
            Err(ArenaError::NoSuchPlayer(2))
        ));
        assert!(arena.controller(2).is_none());
        arena.set_controller(1, ai()).unwrap();
        assert_eq!(arena.controller(1).map(Controller::name), Some("ai"));
    }

    #[test]
    fn test_hook_rewrites_actions() {
        let mut arena = new_arena();
        arena
            .add_hook(Box::new(|player, action| {
                if player == 1 { Action::LEFT } else { action }
            }))
            .unwrap();
        run_to_fight(&mut arena);
        let x0 = arena.state().har_object(1).unwrap().pos.x;
        arena.step().unwrap();
        assert!(arena.state().har_object(1).unwrap().pos.x < x0);
    }

    #[test]
    fn test_rein_toggles_locally() {
        let mut arena = new_arena();
        assert!(arena.toggle_rein().unwrap());
        assert!(arena.state().rein);
        assert!(!arena.toggle_rein().unwrap());
    }

    #[test]
    fn test_debug_refused_in_netplay() {
        let (mut server, _client) = networked_pair();
        assert!(matches!(server.toggle_rein(), Err(ArenaError::Refused(_))));
        assert!(matches!(
            server.add_hook(Box::new(|_, a| a)),
            Err(ArenaError::Refused(_))
        ));
        assert!(server.state().net_mode.is_networked());
    }

    #[test]
    fn test_netplay_peers_agree() {
        let (mut server, mut client) = networked_pair();
        let pairs = run_pair(&mut server, &mut client, 160);
        assert_eq!(pairs.len(), 160);
        for (tick, (s, c)) in pairs.iter().enumerate() {
            assert_eq!(s, c, "hash mismatch at tick {tick}");
        }
        assert_ne!(server.state().phase, MatchPhase::Starting);
    }

    #[test]
    fn test_server_waits_for_client() {
        let (mut server, _client) = networked_pair();
        assert_eq!(server.step().unwrap(), StepOutcome::Waiting);
        assert_eq!(server.state().tick, 0);
    }

    #[test]
    fn test_missing_peer_loses_connection() {
        let (a, _b) = ChannelTransport::pair();
        let mut server = new_arena();
        server.connect(NetSession::new(
            NetRole::Server,
            Box::new(a),
            Duration::from_millis(100),
        ));
        let start = Instant::now();
        assert_eq!(server.step_at(start).unwrap(), StepOutcome::Waiting);
        let err = server.step_at(start + Duration::from_millis(200)).unwrap_err();
        assert!(matches!(
            err,
            ArenaError::Net(NetError::ConnectionLost { tick: 0, .. })
        ));
        assert!(server.halted().is_some());
        assert!(matches!(
            server.step_at(start + Duration::from_millis(300)),
            Err(ArenaError::Halted(_))
        ));
    }

    #[test]
    fn test_desync_halts_client_until_resync() {
        let (mut server, mut client) = networked_pair();
        run_pair(&mut server, &mut client, 5);

        // Corrupt the client's world
        let id = client.state.players[0].har.unwrap();
        client.state.object_mut(id).unwrap().pos.x += 3;

        // Client sends tick 5 input, then the server steps and publishes
        assert_eq!(client.step().unwrap(), StepOutcome::Waiting);
        assert!(matches!(server.step().unwrap(), StepOutcome::Stepped { tick: 5, .. }));
        let err = client.step().unwrap_err();
        assert!(matches!(err, ArenaError::Net(NetError::Desync { tick: 5, .. })));
        assert!(client.halted().is_some());

        server.publish_resync().unwrap();
        run_pair(&mut server, &mut client, 12);
        assert!(client.halted().is_none());
        assert_eq!(client.state().tick, 12);
        assert_eq!(server.state().tick, 12);
        assert_eq!(server.state_hash(), client.state_hash());
    }

    #[test]
    fn test_bad_resync_halts_client() {
        let (mut server, mut client) = networked_pair();
        run_pair(&mut server, &mut client, 3);

        // A har registered to a player slot that does not exist
        let id = server.state.players[1].har.unwrap();
        server.state.object_mut(id).unwrap().har_mut().unwrap().player = 7;
        server.publish_resync().unwrap();

        let err = client.step().unwrap_err();
        assert!(matches!(
            err,
            ArenaError::Net(NetError::BadSnapshot(SnapshotError::NoSuchPlayer { player: 7, .. }))
        ));
        assert!(client.halted().is_some());
        assert_eq!(client.state().tick, 3);
        assert!(client.state().har(1).is_some_and(|h| h.player == 1));
    }
}
