//! Host joystick: gamepads through gilrs plus numpad keys, folded into one
//! Kempston state.

use std::collections::HashSet;

use gilrs::{Axis, Button, Event, GamepadId, Gilrs};
use log::{info, warn};
use spectrum_bridge::{JoystickButton, JoystickState};
use winit::keyboard::KeyCode;

const AXIS_THRESHOLD: f32 = 0.5;

pub struct Gamepad {
    gilrs: Option<Gilrs>,
    active: Option<GamepadId>,
}

impl Gamepad {
    /// Open the gamepad backend. Without one, only the keyboard works.
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(e) => {
                warn!("gamepad support unavailable: {e}");
                None
            }
        };
        Self {
            gilrs,
            active: None,
        }
    }

    /// True if a gamepad backend is running.
    pub fn is_available(&self) -> bool {
        self.gilrs.is_some()
    }

    /// Drain gamepad events; the last pad that sent one becomes active.
    pub fn poll(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return;
        };
        while let Some(Event { id, .. }) = gilrs.next_event() {
            if self.active != Some(id) {
                info!("gamepad {id:?} active");
                self.active = Some(id);
            }
        }
    }

    /// Current joystick state from the active pad and the held keys.
    pub fn state(&self, keys: &HashSet<KeyCode>) -> JoystickState {
        let mut state = keyboard_state(keys);

        let pad = self
            .gilrs
            .as_ref()
            .zip(self.active)
            .and_then(|(gilrs, id)| gilrs.connected_gamepad(id));
        let Some(pad) = pad else {
            return state;
        };

        let mut press = |button: JoystickButton| state.set(button, true);
        if pad.is_pressed(Button::DPadRight) {
            press(JoystickButton::Right);
        }
        if pad.is_pressed(Button::DPadLeft) {
            press(JoystickButton::Left);
        }
        if pad.is_pressed(Button::DPadDown) {
            press(JoystickButton::Down);
        }
        if pad.is_pressed(Button::DPadUp) {
            press(JoystickButton::Up);
        }

        if let Some(axis) = pad.axis_data(Axis::LeftStickX) {
            if axis.value() > AXIS_THRESHOLD {
                press(JoystickButton::Right);
            } else if axis.value() < -AXIS_THRESHOLD {
                press(JoystickButton::Left);
            }
        }
        if let Some(axis) = pad.axis_data(Axis::LeftStickY) {
            if axis.value() > AXIS_THRESHOLD {
                press(JoystickButton::Up);
            } else if axis.value() < -AXIS_THRESHOLD {
                press(JoystickButton::Down);
            }
        }

        let fire_buttons = [
            Button::South,
            Button::East,
            Button::West,
            Button::North,
            Button::LeftTrigger,
            Button::RightTrigger,
            Button::LeftTrigger2,
            Button::RightTrigger2,
        ];
        if fire_buttons.into_iter().any(|b| pad.is_pressed(b)) {
            press(JoystickButton::Fire);
        }
        state
    }
}

/// Numpad directions, Numpad0 or Alt for fire. Arrow keys double as directions.
pub fn keyboard_state(keys: &HashSet<KeyCode>) -> JoystickState {
    let mut state = JoystickState::default();
    let held = |codes: &[KeyCode]| codes.iter().any(|k| keys.contains(k));
    state.set(JoystickButton::Right, held(&[KeyCode::Numpad6, KeyCode::ArrowRight]));
    state.set(JoystickButton::Left, held(&[KeyCode::Numpad4, KeyCode::ArrowLeft]));
    state.set(JoystickButton::Down, held(&[KeyCode::Numpad2, KeyCode::ArrowDown]));
    state.set(JoystickButton::Up, held(&[KeyCode::Numpad8, KeyCode::ArrowUp]));
    state.set(
        JoystickButton::Fire,
        held(&[KeyCode::Numpad0, KeyCode::AltLeft, KeyCode::AltRight]),
    );
    state
}
