//! Hardware and radio seams of the dial.
//!
//! The core state machines only ever talk to these traits.  The firmware
//! binary implements them on top of Embassy and the SoftDevice; the
//! integration tests implement them with recording mocks.

use crate::battery::BatteryReading;
use crate::config::WakeSources;
use crate::dispatch::Action;
use crate::error::{InputError, LinkError, SleepError};
use crate::input::RawSample;

/// Encoder and button.
pub trait InputPort {
    /// Sample the encoder position and the button level.
    fn read(&mut self) -> Result<RawSample, InputError>;

    /// Stop the quadrature decoder; the button stays readable.
    fn release_encoder(&mut self);

    /// Release every input pin ahead of deep sleep.
    fn release_all(&mut self);

    /// Bring released or faulted inputs back up.  The encoder position
    /// restarts from an arbitrary value.
    fn reinit(&mut self) -> Result<(), InputError>;
}

/// HID-over-GATT link to the host.
pub trait HidSink {
    /// Send the reports that carry out `action`.
    fn dispatch(&mut self, action: &Action) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;

    fn is_advertising(&self) -> bool;

    fn start_advertising(&mut self) -> Result<(), LinkError>;

    fn stop_advertising(&mut self) -> Result<(), LinkError>;

    fn disconnect_all(&mut self) -> Result<(), LinkError>;

    /// Publish a battery percentage on the Battery Service.
    fn set_battery_level(&mut self, percent: u8) -> Result<(), LinkError>;
}

/// Deep-sleep entry.
pub trait PowerController {
    /// Arm `wake` and enter deep sleep.
    ///
    /// On hardware a successful call does not return; `Ok` means the
    /// request was accepted.
    fn enter_deep_sleep(&mut self, wake: WakeSources) -> Result<(), SleepError>;
}

/// Battery voltage sensing.
pub trait BatteryMonitor {
    fn sample(&mut self) -> Result<BatteryReading, InputError>;

    /// Power down the ADC and divider.
    fn release(&mut self);
}

/// Status LED.
pub trait Indicator {
    fn set(&mut self, on: bool);

    /// Short visible confirmation of a long press.
    fn acknowledge(&mut self);
}

/// Lets the platform keep its LED for a distress blink when bring-up fails.
impl<T: Indicator + ?Sized> Indicator for &mut T {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }

    fn acknowledge(&mut self) {
        (**self).acknowledge()
    }
}

/// Everything a [`Session`](crate::session::Session) drives.
pub struct Ports<I, H, P, B, L> {
    pub input: I,
    pub hid: H,
    pub power: P,
    pub battery: B,
    pub indicator: L,
}
