//! Gamepad input: one stick (or d-pad axes) and two buttons

use serde::{Deserialize, Serialize};

use super::InputEvent;
use crate::sim::Action;

/// Axis values beyond this count as a direction
pub const AXIS_DEADZONE: i16 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickMap {
    pub device: u32,
    pub x_axis: u8,
    pub y_axis: u8,
    pub punch_button: u8,
    pub kick_button: u8,
}

impl Default for JoystickMap {
    fn default() -> Self {
        Self {
            device: 0,
            x_axis: 0,
            y_axis: 1,
            punch_button: 0,
            kick_button: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct PadState {
    x: i16,
    y: i16,
    punch: bool,
    kick: bool,
}

impl PadState {
    fn directions(&self) -> Action {
        let mut out = Action::empty();
        if self.x <= -AXIS_DEADZONE {
            out |= Action::LEFT;
        } else if self.x >= AXIS_DEADZONE {
            out |= Action::RIGHT;
        }
        if self.y <= -AXIS_DEADZONE {
            out |= Action::UP;
        } else if self.y >= AXIS_DEADZONE {
            out |= Action::DOWN;
        }
        out
    }
}

/// Tracks last and current pad state so buttons act on the press edge
#[derive(Debug, Clone)]
pub struct JoystickController {
    pub map: JoystickMap,
    current: PadState,
    last: PadState,
    /// Presses seen since the last tick, so quick taps are not lost
    latched: Action,
    attached: bool,
}

impl JoystickController {
    pub fn new(map: JoystickMap) -> Self {
        Self {
            map,
            current: PadState::default(),
            last: PadState::default(),
            latched: Action::empty(),
            attached: true,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn handle(&mut self, event: &InputEvent) -> bool {
        match *event {
            InputEvent::JoyAxis { device, axis, value } if device == self.map.device => {
                if axis == self.map.x_axis {
                    self.current.x = value;
                } else if axis == self.map.y_axis {
                    self.current.y = value;
                } else {
                    return false;
                }
                true
            }
            InputEvent::JoyButton {
                device,
                button,
                pressed,
            } if device == self.map.device => {
                if button == self.map.punch_button {
                    if pressed && !self.current.punch {
                        self.latched |= Action::PUNCH;
                    }
                    self.current.punch = pressed;
                } else if button == self.map.kick_button {
                    if pressed && !self.current.kick {
                        self.latched |= Action::KICK;
                    }
                    self.current.kick = pressed;
                } else {
                    return false;
                }
                true
            }
            InputEvent::JoyRemoved { device } if device == self.map.device => {
                log::warn!("joystick {device} removed");
                self.attached = false;
                self.reset();
                true
            }
            _ => false,
        }
    }

    pub fn tick(&mut self) -> Action {
        let mut out = self.current.directions();
        if self.current.punch && !self.last.punch {
            out |= Action::PUNCH;
        }
        if self.current.kick && !self.last.kick {
            out |= Action::KICK;
        }
        out |= self.latched;
        self.latched = Action::empty();
        self.last = self.current;
        out
    }

    pub fn reset(&mut self) {
        self.current = PadState::default();
        self.last = PadState::default();
        self.latched = Action::empty();
    }
}
