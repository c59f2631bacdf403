//! Keyboard input through a configurable keymap

use serde::{Deserialize, Serialize};

use super::InputEvent;
use crate::sim::Action;

/// Scancode per action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keymap {
    pub up: u32,
    pub down: u32,
    pub left: u32,
    pub right: u32,
    pub punch: u32,
    pub kick: u32,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::player_one()
    }
}

impl Keymap {
    /// Arrow keys, right ctrl / right shift
    pub fn player_one() -> Self {
        Self {
            up: 82,
            down: 81,
            left: 80,
            right: 79,
            punch: 228,
            kick: 229,
        }
    }

    /// WASD, left ctrl / left shift
    pub fn player_two() -> Self {
        Self {
            up: 26,
            down: 22,
            left: 4,
            right: 7,
            punch: 224,
            kick: 225,
        }
    }

    pub fn action_for(&self, scancode: u32) -> Option<Action> {
        [
            (self.up, Action::UP),
            (self.down, Action::DOWN),
            (self.left, Action::LEFT),
            (self.right, Action::RIGHT),
            (self.punch, Action::PUNCH),
            (self.kick, Action::KICK),
        ]
        .into_iter()
        .find(|(code, _)| *code == scancode)
        .map(|(_, action)| action)
    }
}

/// Directions count while held; attacks fire once per key press
#[derive(Debug, Clone, Default)]
pub struct KeyboardController {
    pub keymap: Keymap,
    held: Action,
    /// Attack presses since the last tick
    pressed: Action,
}

impl KeyboardController {
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            held: Action::empty(),
            pressed: Action::empty(),
        }
    }

    pub fn handle(&mut self, event: &InputEvent) -> bool {
        match *event {
            InputEvent::KeyDown { scancode } => {
                let Some(action) = self.keymap.action_for(scancode) else {
                    return false;
                };
                // Key repeat arrives as more key-downs; only the first counts
                if action.is_attack() && !self.held.contains(action) {
                    self.pressed |= action;
                }
                self.held |= action;
                true
            }
            InputEvent::KeyUp { scancode } => {
                let Some(action) = self.keymap.action_for(scancode) else {
                    return false;
                };
                self.held.remove(action);
                true
            }
            _ => false,
        }
    }

    pub fn tick(&mut self) -> Action {
        let out = (self.held & Action::DIRECTIONS) | self.pressed;
        self.pressed = Action::empty();
        out
    }

    pub fn reset(&mut self) {
        self.held = Action::empty();
        self.pressed = Action::empty();
    }
}
