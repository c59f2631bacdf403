//! Input sources
//!
//! Every way of driving a har (keyboard, joystick, AI pilot, remote peer)
//! is a [`Controller`] variant. Device events come in through
//! [`Controller::handle`]; the arena polls [`Controller::tick`] exactly once
//! per simulation tick for the player's action set.

pub mod ai;
pub mod joystick;
pub mod keyboard;
pub mod remote;

use serde::{Deserialize, Serialize};

pub use ai::{AiController, PilotProfile};
pub use joystick::{JoystickController, JoystickMap};
pub use keyboard::{KeyboardController, Keymap};
pub use remote::RemoteController;

use crate::sim::{Action, GameState};

/// Raw device event, already decoded by the platform layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown { scancode: u32 },
    KeyUp { scancode: u32 },
    JoyAxis { device: u32, axis: u8, value: i16 },
    JoyButton { device: u32, button: u8, pressed: bool },
    JoyRemoved { device: u32 },
}

#[derive(Debug, Clone)]
pub enum Controller {
    Keyboard(KeyboardController),
    Joystick(JoystickController),
    Ai(AiController),
    Remote(RemoteController),
}

impl Controller {
    /// Feed a device event; returns true if this controller consumed it
    pub fn handle(&mut self, event: &InputEvent) -> bool {
        match self {
            Controller::Keyboard(c) => c.handle(event),
            Controller::Joystick(c) => c.handle(event),
            Controller::Ai(_) | Controller::Remote(_) => false,
        }
    }

    /// Action set for the tick about to be simulated
    pub fn tick(&mut self, state: &GameState) -> Action {
        match self {
            Controller::Keyboard(c) => c.tick(),
            Controller::Joystick(c) => c.tick(),
            Controller::Ai(c) => c.tick(state),
            Controller::Remote(c) => c.tick(state.tick),
        }
    }

    /// Is input for `tick` available without waiting?
    pub fn ready(&self, tick: u64) -> bool {
        match self {
            Controller::Remote(c) => c.has_input(tick),
            _ => true,
        }
    }

    /// Drop held and queued input
    pub fn free(&mut self) {
        match self {
            Controller::Keyboard(c) => c.reset(),
            Controller::Joystick(c) => c.reset(),
            Controller::Ai(c) => c.reset(),
            Controller::Remote(c) => c.clear(),
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, Controller::Remote(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Controller::Keyboard(_) => "keyboard",
            Controller::Joystick(_) => "joystick",
            Controller::Ai(_) => "ai",
            Controller::Remote(_) => "remote",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::AssetTables;

    #[test]
    fn test_dispatch_keyboard() {
        let mut ctrl = Controller::Keyboard(KeyboardController::new(Keymap::player_one()));
        let state = GameState::new(1, [0, 1], Arc::new(AssetTables::builtin()));
        let right = Keymap::player_one().right;
        assert!(ctrl.handle(&InputEvent::KeyDown { scancode: right }));
        assert_eq!(ctrl.tick(&state), Action::RIGHT);
        ctrl.free();
        assert_eq!(ctrl.tick(&state), Action::empty());
    }

    #[test]
    fn test_ai_ignores_device_events() {
        let mut ctrl = Controller::Ai(AiController::new(1, 0, PilotProfile::default(), 5));
        assert!(!ctrl.handle(&InputEvent::KeyDown { scancode: 4 }));
        assert!(ctrl.is_local());
    }

    #[test]
    fn test_remote_readiness() {
        let mut remote = RemoteController::new();
        remote.push(3, Action::KICK);
        let ctrl = Controller::Remote(remote);
        assert!(!ctrl.ready(2));
        assert!(ctrl.ready(3));
        assert!(!ctrl.is_local());
    }
}
