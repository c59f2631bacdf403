//! Discrete per-tick input actions
//!
//! Every input source (keyboard, joystick, AI, remote peer) boils down to one
//! [`Action`] set per player per tick.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of actions a player holds or triggers during one tick
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Action: u8 {
        const UP = 0x01;
        const DOWN = 0x02;
        const LEFT = 0x04;
        const RIGHT = 0x08;
        const PUNCH = 0x10;
        const KICK = 0x20;
    }
}

impl Action {
    pub const DIRECTIONS: Action = Action::UP
        .union(Action::DOWN)
        .union(Action::LEFT)
        .union(Action::RIGHT);
    pub const ATTACKS: Action = Action::PUNCH.union(Action::KICK);

    /// -1 for left, 1 for right, 0 for neither or both
    pub fn horizontal(self) -> i32 {
        match (self.contains(Action::LEFT), self.contains(Action::RIGHT)) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }

    pub fn is_attack(self) -> bool {
        self.intersects(Action::ATTACKS)
    }
}
