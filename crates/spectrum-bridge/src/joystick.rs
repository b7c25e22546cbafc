//! Joystick dispatch and Kempston joystick state.
//!
//! The emulator core calls [`JoystickDispatcher::init`] once and
//! [`JoystickDispatcher::poll`] once per emulated frame. The platform side
//! registers closures for both; with nothing registered the joystick simply
//! reads as idle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

type InitFn = Box<dyn FnMut() -> bool + Send>;
type PollFn = Box<dyn FnMut() + Send>;

/// Registrable joystick init/poll slots.
#[derive(Default)]
pub struct JoystickDispatcher {
    init: Option<InitFn>,
    poll: Option<PollFn>,
}

impl JoystickDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_init<F>(&mut self, init: Option<F>)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.init = init.map(|f| Box::new(f) as InitFn);
    }

    pub fn set_poll<F>(&mut self, poll: Option<F>)
    where
        F: FnMut() + Send + 'static,
    {
        self.poll = poll.map(|f| Box::new(f) as PollFn);
    }

    /// Initialise the host joystick. Succeeds trivially when nothing is registered.
    pub fn init(&mut self) -> bool {
        self.init.as_mut().is_none_or(|init| init())
    }

    /// Read the host joystick for this frame.
    pub fn poll(&mut self) {
        if let Some(poll) = self.poll.as_mut() {
            poll();
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.init.is_some() || self.poll.is_some()
    }

    pub fn clear(&mut self) {
        self.init = None;
        self.poll = None;
    }
}

/// One Kempston joystick direction or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoystickButton {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl JoystickButton {
    pub const ALL: [Self; 5] = [Self::Up, Self::Down, Self::Left, Self::Right, Self::Fire];

    /// Bit in the Kempston port value (active high).
    #[must_use]
    pub const fn mask(self) -> u8 {
        match self {
            Self::Right => 0x01,
            Self::Left => 0x02,
            Self::Down => 0x04,
            Self::Up => 0x08,
            Self::Fire => 0x10,
        }
    }
}

impl fmt::Display for JoystickButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Fire => "FIRE",
        })
    }
}

/// Kempston port value: bits 0-4 are right, left, down, up, fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoystickState(u8);

impl JoystickState {
    const MASK: u8 = 0x1F;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_pressed(self, button: JoystickButton) -> bool {
        self.0 & button.mask() != 0
    }

    pub fn set(&mut self, button: JoystickButton, pressed: bool) {
        if pressed {
            self.0 |= button.mask();
        } else {
            self.0 &= !button.mask();
        }
    }

    /// Pressed buttons, in `JoystickButton::ALL` order.
    pub fn pressed(self) -> impl Iterator<Item = JoystickButton> {
        JoystickButton::ALL
            .into_iter()
            .filter(move |&b| self.is_pressed(b))
    }
}

/// Joystick state shared between the UI thread (writer) and the poll
/// closure on the emulation thread (reader).
#[derive(Debug, Clone, Default)]
pub struct SharedJoystick(Arc<AtomicU8>);

impl SharedJoystick {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn load(&self) -> JoystickState {
        JoystickState::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: JoystickState) {
        self.0.store(state.bits(), Ordering::Release);
    }

    pub fn set(&self, button: JoystickButton, pressed: bool) {
        if pressed {
            self.0.fetch_or(button.mask(), Ordering::AcqRel);
        } else {
            self.0.fetch_and(!button.mask(), Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn unregistered_dispatch_is_a_no_op() {
        let mut joystick = JoystickDispatcher::new();
        assert!(!joystick.is_attached());
        assert!(joystick.init());
        joystick.poll();
    }

    #[test]
    fn registered_closures_are_called() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let mut joystick = JoystickDispatcher::new();
        joystick.set_init(Some(|| false));
        joystick.set_poll(Some(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        assert!(joystick.is_attached());
        assert!(!joystick.init());
        joystick.poll();
        joystick.poll();
        assert_eq!(polls.load(Ordering::Relaxed), 2);

        joystick.set_init(None::<fn() -> bool>);
        assert!(joystick.init());
        joystick.clear();
        joystick.poll();
        assert_eq!(polls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn kempston_bits() {
        let mut state = JoystickState::default();
        state.set(JoystickButton::Up, true);
        state.set(JoystickButton::Fire, true);
        assert_eq!(state.bits(), 0x18);
        assert!(state.is_pressed(JoystickButton::Up));
        assert!(!state.is_pressed(JoystickButton::Down));
        assert_eq!(
            state.pressed().collect::<Vec<_>>(),
            vec![JoystickButton::Up, JoystickButton::Fire]
        );

        state.set(JoystickButton::Up, false);
        assert_eq!(state.bits(), 0x10);
        assert_eq!(JoystickState::from_bits(0xFF).bits(), 0x1F);
    }

    #[test]
    fn button_names() {
        let names: Vec<String> = JoystickButton::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["UP", "DOWN", "LEFT", "RIGHT", "FIRE"]);
    }

    #[test]
    fn shared_state_is_visible_to_clones() {
        let ui = SharedJoystick::new();
        let core = ui.clone();
        ui.set(JoystickButton::Right, true);
        ui.set(JoystickButton::Fire, true);
        assert_eq!(core.load().bits(), 0x11);
        ui.set(JoystickButton::Right, false);
        assert_eq!(core.load().bits(), 0x10);
        ui.store(JoystickState::default());
        assert_eq!(core.load(), JoystickState::default());
    }
}
