//! Action dispatcher - classified input events to host actions.
//!
//! Stateless.  A flushed [`ScrollEvent`] is first expanded into either one
//! gesture or `magnitude` single steps ([`expand_scroll`]); every resulting
//! [`InputEvent`] then maps to at most one [`Action`] through the
//! deployment's [`ActionProfile`], and only while the link is connected.

use crate::config::ActionProfileKind;
use crate::hid::keyboard::{keycode, KeyChord};
use crate::hid::mouse::button;
use crate::input::click::ClickEvent;
use crate::input::scroll::{Direction, ScrollEvent};
use crate::power_logic::LinkState;

/// Classified user intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    ScrollStep(Direction),
    ScrollGesture(Direction),
    Click(ClickEvent),
    LongPressAck,
}

/// Abstract output action, sent within a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Press then release a key chord.
    Key(KeyChord),
    /// Press then release mouse buttons.
    Click(u8),
    /// One wheel report.
    Wheel(i8),
}

/// What one flushed scroll batch turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollExpansion {
    pub event: InputEvent,
    pub repeat: u32,
}

impl ScrollExpansion {
    /// The classified events, one per emitted action.
    pub fn events(self) -> impl Iterator<Item = InputEvent> {
        core::iter::repeat(self.event).take(self.repeat as usize)
    }
}

/// Classify a flushed scroll batch: at or above `gesture_threshold` it is
/// one gesture regardless of magnitude, below it `magnitude` steps.
pub fn expand_scroll(event: ScrollEvent, gesture_threshold: u32) -> ScrollExpansion {
    if event.magnitude >= gesture_threshold {
        ScrollExpansion {
            event: InputEvent::ScrollGesture(event.direction),
            repeat: 1,
        }
    } else {
        ScrollExpansion {
            event: InputEvent::ScrollStep(event.direction),
            repeat: event.magnitude,
        }
    }
}

/// Per-deployment event → action table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActionProfile {
    pub step_positive: Option<Action>,
    pub step_negative: Option<Action>,
    pub gesture_positive: Option<Action>,
    pub gesture_negative: Option<Action>,
    pub single_click: Option<Action>,
    pub double_click: Option<Action>,
    pub triple_click: Option<Action>,
    pub long_press_ack: Option<Action>,
}

impl ActionProfile {
    /// Arrow keys for scrolling and gestures, Enter / Escape / F1 for clicks.
    pub const fn keyboard() -> Self {
        Self {
            step_positive: Some(Action::Key(KeyChord::key(keycode::DOWN_ARROW))),
            step_negative: Some(Action::Key(KeyChord::key(keycode::UP_ARROW))),
            gesture_positive: Some(Action::Key(KeyChord::key(keycode::RIGHT_ARROW))),
            gesture_negative: Some(Action::Key(KeyChord::key(keycode::LEFT_ARROW))),
            single_click: Some(Action::Key(KeyChord::key(keycode::ENTER))),
            double_click: Some(Action::Key(KeyChord::key(keycode::ESCAPE))),
            triple_click: Some(Action::Key(KeyChord::key(keycode::F1))),
            long_press_ack: None,
        }
    }

    /// Wheel for scroll steps and a left click for a single click; the
    /// rest stays on the keyboard.
    pub const fn mouse_keyboard() -> Self {
        Self {
            step_positive: Some(Action::Wheel(-1)),
            step_negative: Some(Action::Wheel(1)),
            single_click: Some(Action::Click(button::LEFT)),
            ..Self::keyboard()
        }
    }

    pub const fn for_kind(kind: ActionProfileKind) -> Self {
        match kind {
            ActionProfileKind::Keyboard => Self::keyboard(),
            ActionProfileKind::MouseKeyboard => Self::mouse_keyboard(),
        }
    }

    /// Table lookup, ignoring link state.
    pub fn lookup(&self, event: InputEvent) -> Option<Action> {
        match event {
            InputEvent::ScrollStep(Direction::Positive) => self.step_positive,
            InputEvent::ScrollStep(Direction::Negative) => self.step_negative,
            InputEvent::ScrollGesture(Direction::Positive) => self.gesture_positive,
            InputEvent::ScrollGesture(Direction::Negative) => self.gesture_negative,
            InputEvent::Click(ClickEvent::Single) => self.single_click,
            InputEvent::Click(ClickEvent::Double) => self.double_click,
            InputEvent::Click(ClickEvent::Triple) => self.triple_click,
            InputEvent::LongPressAck => self.long_press_ack,
        }
    }
}

/// Map one classified event to an action, gated on the link being up.
pub fn dispatch(event: InputEvent, link: LinkState, profile: &ActionProfile) -> Option<Action> {
    if !link.is_connected() {
        return None;
    }
    profile.lookup(event)
}
