//! Computer pilot
//!
//! Looks at the game state once per tick and picks an action set. The AI
//! rolls its own generator, never the game state's: its choices become
//! ordinary inputs, so a networked peer only ever sees the resulting actions.

use serde::{Deserialize, Serialize};

use crate::sim::{Action, GameRng, GameState};

/// Ticks between decisions at the lowest level
const BASE_ACT_TIMER: u32 = 28;
/// Percent chance to throw an attack even when out of range
const RANDOM_ATTACK_CHANCE: u32 = 10;
/// Decisions without an attack before the pilot swings anyway
const MAX_IDLE_ACTS: u32 = 3;
/// Distance at which close attacks connect
pub const STRIKE_RANGE: i32 = 44;
/// Beyond this a projectile is worth throwing
pub const FIREBALL_RANGE: i32 = 110;
/// Highest supported difficulty
pub const MAX_DIFFICULTY: u8 = 5;

/// Pilot personality, each stat 0 to 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotProfile {
    /// Preference for the heavier attack
    pub power: u8,
    /// How eagerly the pilot closes distance
    pub agility: u8,
    /// Likelihood of acting at all on a decision tick
    pub aggression: u8,
}

impl Default for PilotProfile {
    fn default() -> Self {
        Self {
            power: 50,
            agility: 50,
            aggression: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiController {
    pub player: usize,
    pub difficulty: u8,
    pub pilot: PilotProfile,
    rng: GameRng,
    act_timer: u32,
    idle_acts: u32,
}

impl AiController {
    pub fn new(seed: u64, player: usize, pilot: PilotProfile, difficulty: u8) -> Self {
        let mut ai = Self {
            player,
            difficulty: difficulty.min(MAX_DIFFICULTY),
            pilot,
            rng: GameRng::new(seed.wrapping_add(player as u64)),
            act_timer: 0,
            idle_acts: 0,
        };
        ai.act_timer = ai.next_act_timer();
        ai
    }

    /// Internal level 1 to 6
    fn level(&self) -> u32 {
        self.difficulty as u32 + 1
    }

    fn next_act_timer(&mut self) -> u32 {
        BASE_ACT_TIMER - self.level() * 2 - self.rng.int(3)
    }

    fn roll_percent(&mut self, percent: u32) -> bool {
        self.rng.int(100) < percent
    }

    fn pick_attack(&mut self) -> Action {
        if self.roll_percent(self.pilot.power as u32) {
            Action::KICK
        } else {
            Action::PUNCH
        }
    }

    pub fn tick(&mut self, state: &GameState) -> Action {
        let (Some(me), Some(them)) = (state.har_object(self.player), state.har_object(1 - self.player))
        else {
            return Action::empty();
        };
        let Some(my_har) = me.har() else {
            return Action::empty();
        };
        if them.har().is_none_or(|h| h.is_defeated()) {
            return Action::empty();
        }

        let dx = them.pos.x - me.pos.x;
        let dist = dx.abs();
        let toward = if dx < 0 { Action::LEFT } else { Action::RIGHT };

        self.act_timer = self.act_timer.saturating_sub(1);
        if self.act_timer > 0 || !my_har.can_act() {
            // Between decisions: drift toward the opponent
            if dist > STRIKE_RANGE && self.roll_percent(self.pilot.agility as u32) {
                return toward;
            }
            return Action::empty();
        }
        self.act_timer = self.next_act_timer();

        let action = if self.idle_acts >= MAX_IDLE_ACTS {
            self.pick_attack()
        } else if dist <= STRIKE_RANGE {
            if self.roll_percent(50 + self.pilot.aggression as u32 / 2) {
                self.pick_attack()
            } else {
                Action::empty()
            }
        } else if dist >= FIREBALL_RANGE && self.roll_percent(self.level() * 8) {
            Action::DOWN | Action::PUNCH
        } else if self.roll_percent(RANDOM_ATTACK_CHANCE) {
            self.pick_attack()
        } else {
            toward
        };

        if action.is_attack() {
            self.idle_acts = 0;
        } else {
            self.idle_acts += 1;
        }
        action
    }

    pub fn reset(&mut self) {
        self.idle_acts = 0;
        self.act_timer = self.next_act_timer();
    }
}
