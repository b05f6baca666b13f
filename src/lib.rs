//! Core library for the dialscroll BLE scroll dial.
//!
//! Everything the dial decides lives here as pure, host-testable logic:
//! encoder batching, click classification, the power / link state machine,
//! action mapping, HID report encoding and the advertising payload.  The
//! hardware sits behind the traits in [`ports`].
//!
//! Usage: `cargo test` runs every unit and integration test on the host.
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and is only built with `--features embedded`.

#![cfg_attr(not(test), no_std)]

pub mod battery;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hid;
pub mod input;
pub mod ports;
pub mod power_logic;
pub mod session;

pub mod ble {
    pub mod adv;
}

pub use config::DialConfig;
pub use error::Error;
pub use session::{Notice, Session, TickOutcome, TickReport};
