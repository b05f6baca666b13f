//! HID report types and action → report encoding.
//!
//! Every [`Action`] becomes one or two input reports sent within the same
//! tick: key and button actions are a press report followed by the
//! all-released report, wheel and pointer motion is a single report.

pub mod keyboard;
pub mod mouse;


use crate::dispatch::Action;
use heapless::Vec;
use keyboard::{KeyboardReport, KEYBOARD_REPORT_DESCRIPTOR, KEYBOARD_REPORT_SIZE};
use mouse::{MouseReport, MOUSE_REPORT_DESCRIPTOR, MOUSE_REPORT_SIZE};

/// Report ID of the keyboard input report.
pub const KEYBOARD_REPORT_ID: u8 = 1;

/// Report ID of the mouse input report.
pub const MOUSE_REPORT_ID: u8 = 2;

/// Largest serialized input report.
pub const MAX_REPORT_SIZE: usize = KEYBOARD_REPORT_SIZE;

/// Input report ready for the HID Report characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
}

impl HidReport {
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(k) => k.serialize(buf),
            HidReport::Mouse(m) => m.serialize(buf),
        }
    }

    pub fn report_id(&self) -> u8 {
        match self {
            HidReport::Keyboard(_) => KEYBOARD_REPORT_ID,
            HidReport::Mouse(_) => MOUSE_REPORT_ID,
        }
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, HidReport::Keyboard(_))
    }

    pub fn is_mouse(&self) -> bool {
        matches!(self, HidReport::Mouse(_))
    }
}

/// Reports that carry out `action`, in send order.
pub fn reports_for(action: &Action) -> Vec<HidReport, 2> {
    let mut out = Vec::new();
    match *action {
        Action::Key(chord) => {
            let _ = out.push(HidReport::Keyboard(KeyboardReport::pressed(chord)));
            let _ = out.push(HidReport::Keyboard(KeyboardReport::empty()));
        }
        Action::Click(buttons) => {
            let _ = out.push(HidReport::Mouse(MouseReport::buttons(buttons)));
            let _ = out.push(HidReport::Mouse(MouseReport::empty()));
        }
        Action::Wheel(wheel) => {
            let _ = out.push(HidReport::Mouse(MouseReport::scroll(wheel)));
        }
    }
    out
}

const REPORT_MAP_LEN: usize = KEYBOARD_REPORT_DESCRIPTOR.len() + MOUSE_REPORT_DESCRIPTOR.len();

/// Combined report map for the HID Report Map characteristic.
pub const REPORT_MAP: [u8; REPORT_MAP_LEN] =
    concat_descriptors(KEYBOARD_REPORT_DESCRIPTOR, MOUSE_REPORT_DESCRIPTOR);

const fn concat_descriptors<const N: usize>(a: &[u8], b: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let mut i = 0;
    while i < a.len() {
        out[i] = a[i];
        i += 1;
    }
    let mut j = 0;
    while j < b.len() {
        out[a.len() + j] = b[j];
        j += 1;
    }
    out
}

const _: () = assert!(MOUSE_REPORT_SIZE <= MAX_REPORT_SIZE);
