//! Power / link orchestration - pure state machine.
//!
//! The orchestrator owns the dial's [`PowerState`] and decides, once per
//! tick, which [`Directive`]s the session must carry out: (re)start
//! advertising, refresh the battery level, tear the link down, release
//! peripherals, or request deep sleep.
//!
//! ```text
//!   Awake ──long press (armed)──▶ ArmedForSleep ──release──▶ SleepRequested
//!     │                                                          ▲
//!     ├──long press (immediate)─────────────────────────────────┤
//!     └──inactivity timeout─────────────────────────────────────┘
//! ```
//!
//! `SleepRequested` is terminal for the awake session: the device powers
//! down and boots fresh on wake.  The only way back is
//! [`Orchestrator::sleep_failed`], used when the platform refuses to sleep.

use crate::config::{DialConfig, LongPressPolicy, WakeSources, STATUS_BLINK_HALF_PERIOD_MS};
use heapless::Vec;

/// Upper bound on directives produced by one evaluation.
pub const MAX_DIRECTIVES: usize = 6;

/// Power state owned by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Normal operation - advertising or connected.
    Awake,
    /// Long press seen; peripherals released, waiting for button release.
    ArmedForSleep,
    /// Deep sleep has been requested.
    SleepRequested,
}

/// Link state as reported by the radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    Advertising,
    Connected,
}

impl LinkState {
    pub fn from_flags(connected: bool, advertising: bool) -> Self {
        if connected {
            LinkState::Connected
        } else if advertising {
            LinkState::Advertising
        } else {
            LinkState::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }
}

/// Connection edge seen this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEdge {
    Up,
    Down,
}

/// Work the session must carry out on the orchestrator's behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Directive {
    /// Make the dial discoverable again.
    StartAdvertising,
    /// Sample the battery and publish the level.
    RefreshBattery,
    /// Show the long-press acknowledgment on the status indicator.
    Acknowledge,
    /// Release encoder and battery sensing; the button stays live.
    ReleasePeripherals,
    /// Disconnect the host and stop advertising.
    TearDownLink,
    /// Release everything and enter deep sleep.
    EnterDeepSleep(WakeSources),
}

/// What the input side observed this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorInput {
    /// Encoder motion or a press edge.
    pub activity: bool,
    /// The click recognizer crossed the long-press threshold.
    pub long_press: bool,
    /// The button was released.
    pub release_edge: bool,
    pub link: LinkState,
}

/// Outcome of one [`Orchestrator::evaluate`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub directives: Vec<Directive, MAX_DIRECTIVES>,
    pub transition: Option<(PowerState, PowerState)>,
    pub link_edge: Option<LinkEdge>,
}

impl Evaluation {
    fn push(&mut self, directive: Directive) {
        // Capacity covers the longest sequence (immediate long press).
        let _ = self.directives.push(directive);
    }
}

/// Timing and policy knobs the orchestrator reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerTiming {
    pub inactivity_timeout_ms: u64,
    pub battery_refresh_interval_ms: u64,
    pub long_press_policy: LongPressPolicy,
    pub wake_sources: WakeSources,
    pub loop_delay_connected_ms: u64,
    pub loop_delay_disconnected_ms: u64,
}

impl From<&DialConfig> for PowerTiming {
    fn from(c: &DialConfig) -> Self {
        Self {
            inactivity_timeout_ms: c.inactivity_timeout_ms,
            battery_refresh_interval_ms: c.battery_refresh_interval_ms,
            long_press_policy: c.long_press_policy,
            wake_sources: c.wake_sources,
            loop_delay_connected_ms: c.loop_delay_connected_ms,
            loop_delay_disconnected_ms: c.loop_delay_disconnected_ms,
        }
    }
}

/// Top-level power / link state machine.
#[derive(Clone, Debug)]
pub struct Orchestrator {
    state: PowerState,
    last_activity_ms: u64,
    was_connected: bool,
    last_battery_refresh_ms: Option<u64>,
    /// A `TearDownLink` failed and must be issued again.
    teardown_pending: bool,
}

impl Orchestrator {
    /// Start an awake session at `now_ms`.
    pub fn new(now_ms: u64, link: LinkState) -> Self {
        Self {
            state: PowerState::Awake,
            last_activity_ms: now_ms,
            was_connected: link.is_connected(),
            last_battery_refresh_ms: None,
            teardown_pending: false,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    /// Decide this tick's directives.
    pub fn evaluate(&mut self, now_ms: u64, input: OrchestratorInput, t: &PowerTiming) -> Evaluation {
        let mut eval = Evaluation::default();

        if self.state == PowerState::SleepRequested {
            return eval;
        }

        self.track_link(now_ms, input.link, &mut eval);

        match self.state {
            PowerState::Awake => {
                if input.activity {
                    self.last_activity_ms = now_ms;
                }

                if input.long_press {
                    match t.long_press_policy {
                        LongPressPolicy::Armed => {
                            self.transition(PowerState::ArmedForSleep, &mut eval);
                            eval.push(Directive::Acknowledge);
                            eval.push(Directive::ReleasePeripherals);
                            eval.push(Directive::TearDownLink);
                            // Hold crossed the threshold on the release tick.
                            if input.release_edge {
                                self.request_sleep(WakeSources::ButtonOnly, &mut eval);
                            }
                        }
                        LongPressPolicy::Immediate => {
                            eval.push(Directive::Acknowledge);
                            self.request_sleep(t.wake_sources, &mut eval);
                        }
                    }
                    return eval;
                }

                if inactivity_expired(now_ms.saturating_sub(self.last_activity_ms), t.inactivity_timeout_ms) {
                    self.request_sleep(t.wake_sources, &mut eval);
                    return eval;
                }

                self.link_upkeep(now_ms, input.link, t, &mut eval);
            }
            PowerState::ArmedForSleep => {
                if input.release_edge {
                    self.request_sleep(WakeSources::ButtonOnly, &mut eval);
                } else if self.teardown_pending {
                    self.teardown_pending = false;
                    eval.push(Directive::TearDownLink);
                }
            }
            PowerState::SleepRequested => {}
        }

        eval
    }

    /// The platform refused deep sleep: resume the awake loop.
    ///
    /// The activity clock restarts so the inactivity timeout does not fire
    /// again on the very next tick.
    pub fn sleep_failed(&mut self, now_ms: u64) {
        self.state = PowerState::Awake;
        self.last_activity_ms = now_ms;
        self.last_battery_refresh_ms = None;
        self.teardown_pending = false;
    }

    /// The last `TearDownLink` did not complete; while armed it is issued
    /// again on the next tick.
    pub fn teardown_failed(&mut self) {
        self.teardown_pending = true;
    }

    /// The last `RefreshBattery` did not publish a level; it is due again
    /// on the next connected tick.
    pub fn battery_refresh_failed(&mut self) {
        self.last_battery_refresh_ms = None;
    }

    /// Sleep between ticks for the current state.
    pub fn loop_delay_ms(&self, link: LinkState, t: &PowerTiming) -> u64 {
        if self.state == PowerState::Awake && link.is_connected() {
            t.loop_delay_connected_ms
        } else {
            t.loop_delay_disconnected_ms
        }
    }

    fn track_link(&mut self, now_ms: u64, link: LinkState, eval: &mut Evaluation) {
        let connected = link.is_connected();
        if connected == self.was_connected {
            return;
        }
        self.was_connected = connected;

        if connected {
            eval.link_edge = Some(LinkEdge::Up);
            if self.state == PowerState::Awake {
                self.last_battery_refresh_ms = Some(now_ms);
                eval.push(Directive::RefreshBattery);
            }
        } else {
            eval.link_edge = Some(LinkEdge::Down);
            self.last_battery_refresh_ms = None;
        }
    }

    fn link_upkeep(&mut self, now_ms: u64, link: LinkState, t: &PowerTiming, eval: &mut Evaluation) {
        match link {
            LinkState::Disconnected => eval.push(Directive::StartAdvertising),
            LinkState::Advertising => {}
            LinkState::Connected => {
                let due = match self.last_battery_refresh_ms {
                    Some(last) => now_ms.saturating_sub(last) >= t.battery_refresh_interval_ms,
                    None => true,
                };
                if due && !eval.directives.contains(&Directive::RefreshBattery) {
                    self.last_battery_refresh_ms = Some(now_ms);
                    eval.push(Directive::RefreshBattery);
                }
            }
        }
    }

    fn request_sleep(&mut self, wake: WakeSources, eval: &mut Evaluation) {
        // Always torn down again right before sleep; a no-op when the link
        // is already gone.
        if !eval.directives.contains(&Directive::TearDownLink) {
            eval.push(Directive::TearDownLink);
        }
        self.teardown_pending = false;
        self.transition(PowerState::SleepRequested, eval);
        eval.push(Directive::EnterDeepSleep(wake));
    }

    fn transition(&mut self, to: PowerState, eval: &mut Evaluation) {
        let from = self.state;
        self.state = to;
        eval.transition = match eval.transition {
            Some((first, _)) => Some((first, to)),
            None => Some((from, to)),
        };
    }
}

/// `true` once the dial has been idle for longer than the timeout.
pub fn inactivity_expired(idle_ms: u64, timeout_ms: u64) -> bool {
    idle_ms > timeout_ms
}

/// Status LED level: solid while connected, blinking while looking for a
/// host, dark once the dial is on its way to sleep.
pub fn status_led_on(now_ms: u64, link: LinkState, power: PowerState) -> bool {
    match power {
        PowerState::Awake if link.is_connected() => true,
        PowerState::Awake => (now_ms / STATUS_BLINK_HALF_PERIOD_MS) % 2 == 1,
        PowerState::ArmedForSleep | PowerState::SleepRequested => false,
    }
}
