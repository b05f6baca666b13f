//! nRF52840 implementations of the dial's hardware ports.
//!
//! Each adapter wraps an Embassy driver and exposes the synchronous
//! interface the main loop expects.  Async peripherals (QDEC, SAADC) are
//! either serviced by a task or driven to completion in place.

pub mod battery;
pub mod input;
pub mod led;

pub use battery::SaadcBattery;
pub use input::{encoder_task, DialInput};
pub use led::StatusLed;
