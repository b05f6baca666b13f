//! Input classification - encoder motion and button clicks.

pub mod click;
pub mod scroll;

pub use click::{ClickEvent, ClickRecognizer, ClickTiming, ClickUpdate};
pub use scroll::{Direction, ScrollClassifier, ScrollEvent, ScrollUpdate};

use crate::config::DialConfig;

impl From<&DialConfig> for ClickTiming {
    fn from(c: &DialConfig) -> Self {
        Self {
            long_press_ms: c.long_press_ms,
            double_click_window_ms: c.double_click_window_ms,
        }
    }
}

/// One poll of the input hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// Absolute encoder position; wraps.
    pub ticks: i32,
    /// Debounced button level, `true` while held.
    pub pressed: bool,
}
