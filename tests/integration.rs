//! Integration tests driving a whole `Session` through mock ports.

use dialscroll::battery::BatteryReading;
use dialscroll::config::{ActionProfileKind, DialConfig, LongPressPolicy, WakeSources};
use dialscroll::dispatch::{Action, InputEvent};
use dialscroll::error::{Error, InitStage, InputError, LinkError, SleepError};
use dialscroll::hid::keyboard::{keycode, KeyChord};
use dialscroll::hid::mouse::button;
use dialscroll::input::{ClickEvent, Direction, RawSample, ScrollEvent};
use dialscroll::ports::{BatteryMonitor, HidSink, Indicator, InputPort, Ports, PowerController};
use dialscroll::power_logic::PowerState;
use dialscroll::session::{Notice, Session, TickOutcome, TickReport};

// ═══════════════════════════════════════════════════════════════════════════
// Mock ports
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MockInput {
    sample: RawSample,
    fail_reads: u32,
    fail_reinit: bool,
    encoder_released: bool,
    all_released: bool,
    reinits: u32,
}

impl InputPort for MockInput {
    fn read(&mut self) -> Result<RawSample, InputError> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(InputError::EncoderRead);
        }
        if self.all_released {
            return Err(InputError::Released);
        }
        Ok(self.sample)
    }

    fn release_encoder(&mut self) {
        self.encoder_released = true;
    }

    fn release_all(&mut self) {
        self.encoder_released = true;
        self.all_released = true;
    }

    fn reinit(&mut self) -> Result<(), InputError> {
        self.reinits += 1;
        if self.fail_reinit {
            return Err(InputError::EncoderRead);
        }
        self.encoder_released = false;
        self.all_released = false;
        Ok(())
    }
}

#[derive(Default)]
struct MockHid {
    connected: bool,
    advertising: bool,
    fail_dispatch: bool,
    fail_disconnects: u32,
    actions: Vec<Action>,
    start_advertising_calls: u32,
    disconnect_calls: u32,
    disconnects: u32,
    battery_level: Option<u8>,
}

impl HidSink for MockHid {
    fn dispatch(&mut self, action: &Action) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if self.fail_dispatch {
            return Err(LinkError::Notify);
        }
        self.actions.push(*action);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_advertising(&self) -> bool {
        self.advertising
    }

    fn start_advertising(&mut self) -> Result<(), LinkError> {
        self.start_advertising_calls += 1;
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), LinkError> {
        self.advertising = false;
        Ok(())
    }

    fn disconnect_all(&mut self) -> Result<(), LinkError> {
        self.disconnect_calls += 1;
        if self.fail_disconnects > 0 {
            self.fail_disconnects -= 1;
            return Err(LinkError::Disconnect);
        }
        if self.connected {
            self.disconnects += 1;
        }
        self.connected = false;
        Ok(())
    }

    fn set_battery_level(&mut self, percent: u8) -> Result<(), LinkError> {
        self.battery_level = Some(percent);
        Ok(())
    }
}

#[derive(Default)]
struct MockPower {
    refuse: bool,
    requests: Vec<WakeSources>,
}

impl PowerController for MockPower {
    fn enter_deep_sleep(&mut self, wake: WakeSources) -> Result<(), SleepError> {
        self.requests.push(wake);
        if self.refuse {
            Err(SleepError::Rejected(8))
        } else {
            Ok(())
        }
    }
}

struct MockBattery {
    millivolts: u32,
    fail_samples: u32,
    samples: u32,
    released: bool,
}

impl Default for MockBattery {
    fn default() -> Self {
        Self {
            millivolts: 3_900,
            fail_samples: 0,
            samples: 0,
            released: false,
        }
    }
}

impl BatteryMonitor for MockBattery {
    fn sample(&mut self) -> Result<BatteryReading, InputError> {
        self.samples += 1;
        if self.fail_samples > 0 {
            self.fail_samples -= 1;
            return Err(InputError::BatteryRead);
        }
        self.released = false;
        Ok(BatteryReading::from_millivolts(self.millivolts))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[derive(Default)]
struct MockLed {
    on: bool,
    acknowledgments: u32,
}

impl Indicator for MockLed {
    fn set(&mut self, on: bool) {
        self.on = on;
    }

    fn acknowledge(&mut self) {
        self.acknowledgments += 1;
    }
}

type Dial = Session<MockInput, MockHid, MockPower, MockBattery, MockLed>;

fn ports(connected: bool) -> Ports<MockInput, MockHid, MockPower, MockBattery, MockLed> {
    Ports {
        input: MockInput::default(),
        hid: MockHid {
            connected,
            ..MockHid::default()
        },
        power: MockPower::default(),
        battery: MockBattery::default(),
        indicator: MockLed::default(),
    }
}

fn connected_dial(config: DialConfig) -> Dial {
    Session::start(config, ports(true), 0).expect("session starts")
}

/// Tick every 10 ms from `from` to `until` inclusive, letting `script` set
/// the input level before each tick.  Stops early once the dial sleeps.
fn run(
    dial: &mut Dial,
    from: u64,
    until: u64,
    mut script: impl FnMut(u64, &mut MockInput),
) -> Vec<(u64, TickReport)> {
    let mut reports = Vec::new();
    let mut t = from;
    while t <= until {
        script(t, &mut dial.ports_mut().input);
        let report = dial.tick(t);
        let asleep = report.outcome == TickOutcome::Asleep;
        reports.push((t, report));
        if asleep {
            break;
        }
        t += 10;
    }
    reports
}

fn dispatched(reports: &[(u64, TickReport)]) -> Vec<(u64, InputEvent)> {
    reports
        .iter()
        .flat_map(|(t, r)| r.dispatched().map(move |ev| (*t, ev)))
        .collect()
}

fn presses(pressed_during: &'static [(u64, u64)]) -> impl FnMut(u64, &mut MockInput) {
    move |t, input| {
        input.sample.pressed = pressed_during.iter().any(|&(a, b)| t >= a && t < b);
    }
}

fn key(k: u8) -> Action {
    Action::Key(KeyChord::key(k))
}

// ═══════════════════════════════════════════════════════════════════════════
// Click timing
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn double_click_reported_once_window_closes() {
    let mut dial = connected_dial(DialConfig::default());
    let reports = run(&mut dial, 0, 1_500, presses(&[(0, 100), (200, 300)]));

    assert_eq!(
        dispatched(&reports),
        vec![(800, InputEvent::Click(ClickEvent::Double))]
    );
    assert_eq!(dial.ports().hid.actions, vec![key(keycode::ESCAPE)]);
}

#[test]
fn single_click_reported_at_release_plus_window() {
    let mut dial = connected_dial(DialConfig::default());
    let reports = run(&mut dial, 0, 1_500, presses(&[(0, 100)]));

    assert_eq!(
        dispatched(&reports),
        vec![(600, InputEvent::Click(ClickEvent::Single))]
    );
    assert_eq!(dial.ports().hid.actions, vec![key(keycode::ENTER)]);
}

#[test]
fn triple_click_reported_on_third_release() {
    let mut dial = connected_dial(DialConfig::default());
    let reports = run(&mut dial, 0, 1_500, presses(&[(0, 50), (100, 150), (200, 250)]));

    assert_eq!(
        dispatched(&reports),
        vec![(250, InputEvent::Click(ClickEvent::Triple))]
    );
    assert_eq!(dial.ports().hid.actions, vec![key(keycode::F1)]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Long press
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn armed_long_press_sleeps_on_release_with_button_wake() {
    let mut dial = connected_dial(DialConfig::default());

    let reports = run(&mut dial, 0, 6_990, presses(&[(0, 7_000)]));
    assert!(reports.iter().all(|(_, r)| r.outcome != TickOutcome::Asleep));
    assert_eq!(dial.power_state(), PowerState::ArmedForSleep);

    let ports = dial.ports();
    assert_eq!(ports.indicator.acknowledgments, 1);
    assert!(ports.input.encoder_released);
    assert!(ports.battery.released);
    assert_eq!(ports.hid.disconnects, 1);
    assert!(!ports.hid.advertising);
    assert!(ports.power.requests.is_empty());
    assert!(!ports.indicator.on);

    let reports = run(&mut dial, 7_000, 7_000, presses(&[]));
    assert_eq!(reports[0].1.outcome, TickOutcome::Asleep);
    assert_eq!(dial.ports().power.requests, vec![WakeSources::ButtonOnly]);
    assert!(dial.ports().hid.actions.is_empty());
}

#[test]
fn armed_long_press_transition_happens_at_threshold() {
    let mut dial = connected_dial(DialConfig::default());
    let reports = run(&mut dial, 0, 5_100, presses(&[(0, 10_000)]));

    let armed_at: Vec<u64> = reports
        .iter()
        .filter(|(_, r)| {
            r.notices.contains(&Notice::PowerTransition {
                from: PowerState::Awake,
                to: PowerState::ArmedForSleep,
            })
        })
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(armed_at, vec![5_000]);
}

#[test]
fn immediate_long_press_sleeps_when_threshold_crossed() {
    let mut config = DialConfig::default();
    config.long_press_policy = LongPressPolicy::Immediate;
    let mut dial = connected_dial(config);

    let reports = run(&mut dial, 0, 10_000, presses(&[(0, 10_000)]));
    let (t, last) = reports.last().expect("ticked");
    assert_eq!(*t, 5_000);
    assert_eq!(last.outcome, TickOutcome::Asleep);

    let ports = dial.ports();
    assert_eq!(ports.power.requests, vec![WakeSources::ButtonAndEncoder]);
    assert_eq!(ports.indicator.acknowledgments, 1);
    assert!(ports.input.all_released);
    assert!(!ports.hid.connected);
}

fn quick_arming() -> DialConfig {
    let mut config = DialConfig::default();
    config.long_press_ms = 300;
    config
}

#[test]
fn failed_teardown_is_retried_before_armed_sleep() {
    let mut dial = connected_dial(quick_arming());
    dial.ports_mut().hid.fail_disconnects = 1;

    let reports = run(&mut dial, 0, 990, presses(&[(0, 1_000)]));
    assert_eq!(dial.power_state(), PowerState::ArmedForSleep);
    let faults: Vec<Error> = reports.iter().flat_map(|(_, r)| r.faults()).collect();
    assert_eq!(faults, vec![Error::LinkOperation(LinkError::Disconnect)]);

    let hid = &dial.ports().hid;
    assert_eq!(hid.disconnect_calls, 2);
    assert!(!hid.connected);

    let reports = run(&mut dial, 1_000, 1_000, presses(&[]));
    assert_eq!(reports[0].1.outcome, TickOutcome::Asleep);
    assert!(!dial.ports().hid.connected);
    assert_eq!(dial.ports().power.requests, vec![WakeSources::ButtonOnly]);
}

#[test]
fn read_fault_while_armed_keeps_encoder_released() {
    let mut dial = connected_dial(quick_arming());
    run(&mut dial, 0, 400, presses(&[(0, 1_000)]));
    assert_eq!(dial.power_state(), PowerState::ArmedForSleep);

    dial.ports_mut().input.fail_reads = 1;
    let report = dial.tick(410);
    assert_eq!(
        report.faults().collect::<Vec<_>>(),
        vec![Error::TransientInput(InputError::EncoderRead)]
    );
    assert_eq!(dial.power_state(), PowerState::ArmedForSleep);
    assert_eq!(dial.ports().input.reinits, 0);
    assert!(dial.ports().input.encoder_released);

    // The button is still honoured once reads work again.
    let reports = run(&mut dial, 420, 420, presses(&[]));
    assert_eq!(reports[0].1.outcome, TickOutcome::Asleep);
    assert_eq!(dial.ports().input.reinits, 0);
    assert_eq!(dial.ports().power.requests, vec![WakeSources::ButtonOnly]);
}

#[test]
fn long_press_is_not_a_click() {
    let mut config = DialConfig::default();
    config.long_press_policy = LongPressPolicy::Immediate;
    config.long_press_ms = 300;
    let mut dial = connected_dial(config);

    run(&mut dial, 0, 1_000, presses(&[(0, 400)]));
    assert!(dial.ports().hid.actions.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Link handling
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn advertising_started_once_and_nothing_dispatched_while_disconnected() {
    let mut dial = Session::start(DialConfig::default(), ports(false), 0).expect("session starts");

    run(&mut dial, 0, 2_000, |t, input| {
        input.sample.ticks = (t / 100) as i32;
        input.sample.pressed = (t / 250) % 2 == 1;
    });

    let hid = &dial.ports().hid;
    assert_eq!(hid.start_advertising_calls, 1);
    assert!(hid.actions.is_empty());
}

#[test]
fn advertising_restarts_after_it_stops() {
    let mut dial = Session::start(DialConfig::default(), ports(false), 0).expect("session starts");
    run(&mut dial, 0, 100, |_, _| {});
    dial.ports_mut().hid.advertising = false;
    run(&mut dial, 110, 200, |_, _| {});
    assert_eq!(dial.ports().hid.start_advertising_calls, 2);
}

#[test]
fn battery_published_on_connect_and_periodically() {
    let mut dial = Session::start(DialConfig::default(), ports(false), 0).expect("session starts");
    run(&mut dial, 0, 100, |_, _| {});
    assert_eq!(dial.ports().battery.samples, 0);

    dial.ports_mut().hid.connected = true;
    let reports = run(&mut dial, 110, 110, |_, _| {});
    assert!(reports[0].1.notices.contains(&Notice::LinkUp));
    assert_eq!(dial.ports().hid.battery_level, Some(75));
    assert_eq!(dial.ports().battery.samples, 1);

    // Keep the dial busy so it does not fall asleep.
    run(&mut dial, 120, 60_200, |t, input| input.sample.ticks = (t / 1_000) as i32);
    assert_eq!(dial.ports().battery.samples, 2);
}

#[test]
fn failed_battery_refresh_is_retried_next_tick() {
    let mut dial = Session::start(DialConfig::default(), ports(false), 0).expect("session starts");
    run(&mut dial, 0, 100, |_, _| {});

    dial.ports_mut().hid.connected = true;
    dial.ports_mut().battery.fail_samples = 1;
    let report = dial.tick(110);
    assert_eq!(
        report.faults().collect::<Vec<_>>(),
        vec![Error::TransientInput(InputError::BatteryRead)]
    );
    assert_eq!(dial.ports().hid.battery_level, None);

    let report = dial.tick(120);
    assert!(report.faults().next().is_none());
    assert_eq!(dial.ports().battery.samples, 2);
    assert_eq!(dial.ports().hid.battery_level, Some(75));
}

#[test]
fn status_led_follows_the_link() {
    let mut dial = connected_dial(DialConfig::default());
    run(&mut dial, 0, 0, |_, _| {});
    assert!(dial.ports().indicator.on);

    dial.ports_mut().hid.connected = false;
    dial.ports_mut().hid.advertising = true;
    run(&mut dial, 10, 10, |_, _| {});
    assert!(!dial.ports().indicator.on);
    run(&mut dial, 510, 510, |_, _| {});
    assert!(dial.ports().indicator.on);
}

#[test]
fn loop_delay_depends_on_connection() {
    let mut dial = connected_dial(DialConfig::default());
    assert_eq!(dial.tick(0).outcome, TickOutcome::Continue { delay_ms: 10 });

    dial.ports_mut().hid.connected = false;
    dial.ports_mut().hid.advertising = true;
    assert_eq!(dial.tick(10).outcome, TickOutcome::Continue { delay_ms: 100 });
}

#[test]
fn failed_notification_is_reported_and_dropped() {
    let mut dial = connected_dial(DialConfig::default());
    dial.ports_mut().hid.fail_dispatch = true;

    let reports = run(&mut dial, 0, 1_000, presses(&[(0, 100)]));
    let faults: Vec<Error> = reports.iter().flat_map(|(_, r)| r.faults()).collect();
    assert_eq!(faults, vec![Error::LinkOperation(LinkError::Notify)]);
    assert_eq!(dial.power_state(), PowerState::Awake);
}

// ═══════════════════════════════════════════════════════════════════════════
// Scrolling
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn small_batches_are_steps_large_batches_one_gesture() {
    let mut dial = connected_dial(DialConfig::default());
    let reports = run(&mut dial, 0, 800, |t, input| {
        input.sample.ticks = match t {
            0..=9 => 0,
            10..=299 => 2,
            _ => 7,
        };
    });

    assert_eq!(
        dispatched(&reports),
        vec![
            (210, InputEvent::ScrollStep(Direction::Positive)),
            (210, InputEvent::ScrollStep(Direction::Positive)),
            (500, InputEvent::ScrollGesture(Direction::Positive)),
        ]
    );
    assert_eq!(
        dial.ports().hid.actions,
        vec![
            key(keycode::DOWN_ARROW),
            key(keycode::DOWN_ARROW),
            key(keycode::RIGHT_ARROW)
        ]
    );
}

#[test]
fn reversal_flushes_before_new_direction() {
    let mut dial = connected_dial(DialConfig::default());
    let reports = run(&mut dial, 0, 500, |t, input| {
        input.sample.ticks = match t {
            0..=9 => 0,
            10..=49 => 2,
            _ => 1,
        };
    });

    let reversal_at = reports.iter().find_map(|(t, r)| {
        r.notices.iter().find_map(|n| match n {
            Notice::ReversalFlush(ev) => Some((*t, *ev)),
            _ => None,
        })
    });
    assert_eq!(
        reversal_at,
        Some((
            50,
            ScrollEvent {
                direction: Direction::Positive,
                magnitude: 2
            }
        ))
    );
    assert_eq!(
        dispatched(&reports),
        vec![
            (50, InputEvent::ScrollStep(Direction::Positive)),
            (50, InputEvent::ScrollStep(Direction::Positive)),
            (250, InputEvent::ScrollStep(Direction::Negative)),
        ]
    );
}

#[test]
fn mouse_profile_scrolls_with_the_wheel() {
    let mut config = DialConfig::default();
    config.action_profile = ActionProfileKind::MouseKeyboard;
    let mut dial = connected_dial(config);

    run(&mut dial, 0, 1_000, |t, input| {
        input.sample.ticks = if t >= 10 { -1 } else { 0 };
        input.sample.pressed = (300..350).contains(&t);
    });
    assert_eq!(
        dial.ports().hid.actions,
        vec![Action::Wheel(1), Action::Click(button::LEFT)]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Inactivity and sleep
// ═══════════════════════════════════════════════════════════════════════════

fn short_timeout() -> DialConfig {
    let mut config = DialConfig::default();
    config.inactivity_timeout_ms = 1_000;
    config
}

#[test]
fn inactivity_requests_exactly_one_sleep() {
    let mut dial = connected_dial(short_timeout());
    let reports = run(&mut dial, 0, 5_000, |_, _| {});

    let (t, last) = reports.last().expect("ticked");
    assert_eq!(*t, 1_010);
    assert_eq!(last.outcome, TickOutcome::Asleep);
    assert_eq!(dial.ports().power.requests, vec![WakeSources::ButtonAndEncoder]);

    // Further ticks are inert.
    assert_eq!(dial.tick(1_020).outcome, TickOutcome::Asleep);
    assert_eq!(dial.ports().power.requests.len(), 1);
}

#[test]
fn activity_postpones_inactivity_sleep() {
    let mut dial = connected_dial(short_timeout());
    let reports = run(&mut dial, 0, 1_500, |t, input| {
        input.sample.ticks = if t >= 800 { 1 } else { 0 };
    });
    assert!(reports.iter().all(|(_, r)| r.outcome != TickOutcome::Asleep));
    assert!(dial.ports().power.requests.is_empty());
}

#[test]
fn refused_sleep_backs_off_and_resumes() {
    let mut dial = connected_dial(short_timeout());
    dial.ports_mut().power.refuse = true;

    let reports = run(&mut dial, 0, 1_010, |_, _| {});
    let (_, last) = reports.last().expect("ticked");
    assert_eq!(last.outcome, TickOutcome::Continue { delay_ms: 1_000 });
    assert_eq!(
        last.faults().collect::<Vec<_>>(),
        vec![Error::SleepEntry(SleepError::Rejected(8))]
    );
    assert_eq!(dial.power_state(), PowerState::Awake);

    let report = dial.tick(2_010);
    assert!(report.notices.contains(&Notice::InputRecovered));
    assert!(report.notices.contains(&Notice::AdvertisingStarted));
    assert_ne!(report.outcome, TickOutcome::Asleep);
    assert_eq!(dial.ports().input.reinits, 1);
    assert_eq!(dial.ports().power.requests.len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Input faults
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn failing_first_read_is_critical() {
    let mut ports = ports(true);
    ports.input.fail_reads = 1;
    let result = Session::start(DialConfig::default(), ports, 0);
    assert_eq!(result.err(), Some(Error::CriticalInit(InitStage::Input)));
}

#[test]
fn transient_read_failure_reuses_last_sample() {
    let mut ports = ports(true);
    ports.input.sample.ticks = 40;
    let mut dial = Session::start(DialConfig::default(), ports, 0).expect("session starts");
    dial.tick(0);

    dial.ports_mut().input.fail_reads = 1;
    let report = dial.tick(10);
    assert_eq!(
        report.faults().collect::<Vec<_>>(),
        vec![Error::TransientInput(InputError::EncoderRead)]
    );
    assert!(report.notices.contains(&Notice::InputRecovered));
    assert_eq!(dial.ports().input.reinits, 1);

    // The decoder restarted at a new position: no phantom scroll.
    dial.ports_mut().input.sample.ticks = 0;
    let reports = run(&mut dial, 20, 600, |_, _| {});
    assert!(dispatched(&reports).is_empty());
}

#[test]
fn failed_reinit_is_retried_next_tick() {
    let mut dial = connected_dial(DialConfig::default());
    dial.ports_mut().input.fail_reads = 2;
    dial.ports_mut().input.fail_reinit = true;
    dial.tick(0);
    dial.tick(10);
    assert_eq!(dial.ports().input.reinits, 3);

    dial.ports_mut().input.fail_reinit = false;
    let report = dial.tick(20);
    assert!(report.notices.contains(&Notice::InputRecovered));
    assert_eq!(dial.ports().input.reinits, 4);
}
