//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, pin assignments and protocol constants live
//! here so they can be tuned in one place.  [`DialConfig`] bundles the
//! per-deployment options the core reads at runtime; the firmware uses
//! [`DialConfig::default`], which is built from the constants below.

// Input timing

/// No qualifying input for this long puts the dial into deep sleep (ms).
pub const INACTIVITY_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Button hold time that counts as a long press (ms).
pub const LONG_PRESS_MS: u64 = 5_000;

/// Follow-up releases within this window extend a click run (ms).
pub const DOUBLE_CLICK_WINDOW_MS: u64 = 500;

/// Encoder motion is batched for this long before it is flushed (ms).
pub const SCROLL_BATCHING_DELAY_MS: u64 = 200;

/// Flushed scroll magnitude at or above this is a single gesture.
pub const GESTURE_THRESHOLD: u32 = 3;

// Loop cadence

/// Poll interval while a host is connected (ms).
pub const LOOP_DELAY_CONNECTED_MS: u64 = 10;

/// Poll interval while advertising or armed for sleep (ms).
pub const LOOP_DELAY_DISCONNECTED_MS: u64 = 100;

/// Back-off after a failed deep-sleep attempt before input is re-armed (ms).
pub const SLEEP_RETRY_DELAY_MS: u64 = 1_000;

/// Half-period of the "not connected" status blink (ms).
pub const STATUS_BLINK_HALF_PERIOD_MS: u64 = 500;

// Battery

/// Interval between battery level refreshes while connected (ms).
pub const BATTERY_REFRESH_INTERVAL_MS: u64 = 60_000;

/// Cell voltage reported as 0 %.
pub const BATTERY_EMPTY_MV: u32 = 3_000;

/// Cell voltage reported as 100 %.
pub const BATTERY_FULL_MV: u32 = 4_200;

// BLE

/// GAP appearance value (0x03C1, HID keyboard).
pub const BLE_APPEARANCE: u16 = 961;

/// Prefix of the advertised device name; the last two bytes of the
/// device unique id are appended in hex.
pub const BLE_NAME_PREFIX: &str = "Dial Scroll ";

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const BLE_ADV_INTERVAL: u32 = 160;

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for HID).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Device Information Service strings.
pub const DIS_MANUFACTURER: &str = "Stony Brook University";
pub const DIS_SOFTWARE_REVISION: &str = "1.1";

/// Bonded hosts remembered for the current power cycle.
pub const MAX_BONDS: usize = 4;

/// Half period of the long-press acknowledgment blink (ms).
pub const ACK_BLINK_MS: u64 = 100;

// GPIO pin assignments (Seeed XIAO nRF52840 defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Button (active-low)  → P1.15 (D10)
//   Encoder A            → P1.12 (D7)
//   Encoder B            → P1.13 (D8)
//   Battery sense        → P0.31 (AIN7, 1M/510k divider enabled by P0.14)
//   Status LED           → P0.26 (active-low)

/// Port-1 pin numbers used to configure deep-sleep wake sensing.
pub const BUTTON_PIN: u8 = 15;
pub const ENCODER_A_PIN: u8 = 12;
pub const ENCODER_B_PIN: u8 = 13;

/// What happens when the button has been held for [`LONG_PRESS_MS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LongPressPolicy {
    /// Tear everything down and sleep as soon as the threshold is crossed.
    Immediate,
    /// Release peripherals now, sleep on the next button release.
    Armed,
}

/// Which output table the dispatcher uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionProfileKind {
    /// Everything is a key tap (arrows, Enter, Escape, F1).
    Keyboard,
    /// Scroll steps become wheel motion and single click a left click.
    MouseKeyboard,
}

/// Pins that end deep sleep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSources {
    ButtonOnly,
    ButtonAndEncoder,
}

impl WakeSources {
    /// Port-1 pin numbers armed as wake sources.
    pub fn pins(self) -> &'static [u8] {
        match self {
            WakeSources::ButtonOnly => &[BUTTON_PIN],
            WakeSources::ButtonAndEncoder => &[BUTTON_PIN, ENCODER_A_PIN, ENCODER_B_PIN],
        }
    }
}

/// Pin level that ends deep sleep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSense {
    Low,
    High,
}

/// Sense level to arm on wake pin `pin`, given its current level.
///
/// A pin already at its sense level wakes the chip the moment it powers
/// off.  The button is only armed once it reads released (`None` until
/// then); encoder pins rest at either level, so they sense the opposite
/// one.
pub fn wake_sense(pin: u8, is_high: bool) -> Option<WakeSense> {
    match (pin == BUTTON_PIN, is_high) {
        (true, true) => Some(WakeSense::Low),
        (true, false) => None,
        (false, true) => Some(WakeSense::Low),
        (false, false) => Some(WakeSense::High),
    }
}

/// Per-deployment configuration read by the core state machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DialConfig {
    pub inactivity_timeout_ms: u64,
    pub long_press_ms: u64,
    pub double_click_window_ms: u64,
    pub scroll_batching_delay_ms: u64,
    pub gesture_threshold: u32,
    pub long_press_policy: LongPressPolicy,
    pub action_profile: ActionProfileKind,
    pub battery_refresh_interval_ms: u64,
    /// Wake pins for inactivity sleep and the immediate long-press policy.
    /// The armed policy always wakes on the button alone.
    pub wake_sources: WakeSources,
    pub loop_delay_connected_ms: u64,
    pub loop_delay_disconnected_ms: u64,
    pub sleep_retry_delay_ms: u64,
}

impl DialConfig {
    pub const fn new() -> Self {
        Self {
            inactivity_timeout_ms: INACTIVITY_TIMEOUT_MS,
            long_press_ms: LONG_PRESS_MS,
            double_click_window_ms: DOUBLE_CLICK_WINDOW_MS,
            scroll_batching_delay_ms: SCROLL_BATCHING_DELAY_MS,
            gesture_threshold: GESTURE_THRESHOLD,
            long_press_policy: LongPressPolicy::Armed,
            action_profile: ActionProfileKind::Keyboard,
            battery_refresh_interval_ms: BATTERY_REFRESH_INTERVAL_MS,
            wake_sources: WakeSources::ButtonAndEncoder,
            loop_delay_connected_ms: LOOP_DELAY_CONNECTED_MS,
            loop_delay_disconnected_ms: LOOP_DELAY_DISCONNECTED_MS,
            sleep_retry_delay_ms: SLEEP_RETRY_DELAY_MS,
        }
    }
}

impl Default for DialConfig {
    fn default() -> Self {
        Self::new()
    }
}
