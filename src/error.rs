//! Unified error type for dialscroll.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.
//!
//! How each class is handled:
//!
//! - [`Error::TransientInput`]: pin/ADC read failed; last-known values are
//!   reused and the read is retried next tick.
//! - [`Error::LinkOperation`]: advertise/disconnect/notify failed; the tick's
//!   effect is dropped and retried next tick.
//! - [`Error::SleepEntry`]: deep sleep was refused; the session backs off,
//!   re-arms input hardware and keeps running.
//! - [`Error::CriticalInit`]: boot-time bring-up failed; surfaced to the
//!   platform, which shows a distress blink.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Encoder, button or battery read failed.
    TransientInput(InputError),

    /// A radio / HID sink operation failed.
    LinkOperation(LinkError),

    /// The deep-sleep request failed or returned.
    SleepEntry(SleepError),

    /// Hardware or link bring-up failed at boot.
    CriticalInit(InitStage),
}

/// Input port failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// Quadrature decoder could not be read.
    EncoderRead,
    /// Button level could not be read.
    ButtonRead,
    /// Battery ADC sample failed.
    BatteryRead,
    /// The peripheral was released and has not been re-initialised.
    Released,
}

/// Subset of radio errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// GAP / GATT raw error code from the SoftDevice.
    Raw(u32),
    /// Advertising could not be started or stopped.
    Advertise,
    /// Disconnect request was rejected.
    Disconnect,
    /// HID report notification failed.
    Notify,
    /// No host is connected.
    NotConnected,
}

/// Deep-sleep entry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepError {
    /// A wake pin could not be configured.
    WakeSourceConfig,
    /// The platform refused System OFF (raw error code).
    Rejected(u32),
}

/// Which bring-up step failed at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStage {
    /// Encoder / button could not be configured or read.
    Input,
    /// SoftDevice or GATT server could not be brought up.
    Radio,
}

// Convenience conversions

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Error::TransientInput(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::LinkOperation(e)
    }
}

impl From<SleepError> for Error {
    fn from(e: SleepError) -> Self {
        Error::SleepEntry(e)
    }
}
