//! Awake-session supervisor.
//!
//! [`Session`] owns the ports and the three state machines and runs one
//! tick per call in a fixed order:
//!
//! ```text
//!   input.read ─▶ scroll / clicks ─▶ orchestrator ─▶ dispatch ─▶ directives
//! ```
//!
//! Every port failure is routed here.  Input faults reuse the last sample
//! and trigger a re-init; link faults drop the tick's effect; a refused
//! deep sleep backs off and resumes the awake loop.  Nothing here logs:
//! what happened is returned as [`Notice`]s for the platform to report.

use crate::battery::BatteryReading;
use crate::config::{DialConfig, WakeSources};
use crate::dispatch::{dispatch, expand_scroll, ActionProfile, InputEvent};
use crate::error::{Error, InitStage};
use crate::input::{
    ClickEvent, ClickRecognizer, ClickTiming, ClickUpdate, RawSample, ScrollClassifier,
    ScrollEvent, ScrollUpdate,
};
use crate::ports::{BatteryMonitor, HidSink, Indicator, InputPort, Ports, PowerController};
use crate::power_logic::{
    status_led_on, Directive, LinkEdge, LinkState, Orchestrator, OrchestratorInput, PowerState,
    PowerTiming,
};
use heapless::Vec;

/// Upper bound on notices reported by one tick; extra notices are dropped.
pub const MAX_NOTICES: usize = 16;

/// Something worth reporting that happened during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    PowerTransition { from: PowerState, to: PowerState },
    LinkUp,
    LinkDown,
    /// Buffered motion flushed early by a direction change.
    ReversalFlush(ScrollEvent),
    LongPress,
    Click(ClickEvent),
    /// An action reached the HID sink.
    Dispatched(InputEvent),
    BatteryRefreshed(BatteryReading),
    AdvertisingStarted,
    /// Input hardware came back after a fault or a refused sleep.
    InputRecovered,
    SleepRequested(WakeSources),
    Fault(Error),
}

/// How the platform loop continues after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Wait `delay_ms` and tick again.
    Continue { delay_ms: u64 },
    /// Deep sleep was accepted; the loop ends.
    Asleep,
}

/// Result of one [`Session::tick`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub notices: Vec<Notice, MAX_NOTICES>,
}

impl TickReport {
    fn new() -> Self {
        Self {
            outcome: TickOutcome::Continue { delay_ms: 0 },
            notices: Vec::new(),
        }
    }

    fn note(&mut self, notice: Notice) {
        let _ = self.notices.push(notice);
    }

    fn fault(&mut self, err: impl Into<Error>) {
        self.note(Notice::Fault(err.into()));
    }

    pub fn faults(&self) -> impl Iterator<Item = Error> + '_ {
        self.notices.iter().filter_map(|n| match n {
            Notice::Fault(e) => Some(*e),
            _ => None,
        })
    }

    pub fn dispatched(&self) -> impl Iterator<Item = InputEvent> + '_ {
        self.notices.iter().filter_map(|n| match n {
            Notice::Dispatched(ev) => Some(*ev),
            _ => None,
        })
    }
}

/// One awake session of the dial.
pub struct Session<I, H, P, B, L> {
    config: DialConfig,
    power_timing: PowerTiming,
    click_timing: ClickTiming,
    profile: ActionProfile,
    ports: Ports<I, H, P, B, L>,
    scroll: ScrollClassifier,
    clicks: ClickRecognizer,
    orchestrator: Orchestrator,
    last_sample: RawSample,
    recovering: bool,
}

impl<I, H, P, B, L> Session<I, H, P, B, L>
where
    I: InputPort,
    H: HidSink,
    P: PowerController,
    B: BatteryMonitor,
    L: Indicator,
{
    /// Take the initial input sample and start the state machines.
    ///
    /// A failing first read is a bring-up failure, not a transient fault.
    pub fn start(config: DialConfig, mut ports: Ports<I, H, P, B, L>, now_ms: u64) -> Result<Self, Error> {
        let sample = ports
            .input
            .read()
            .map_err(|_| Error::CriticalInit(InitStage::Input))?;
        let link = link_state(&ports.hid);

        let mut scroll = ScrollClassifier::new();
        scroll.update(now_ms, sample.ticks, config.scroll_batching_delay_ms);

        Ok(Self {
            power_timing: PowerTiming::from(&config),
            click_timing: ClickTiming::from(&config),
            profile: ActionProfile::for_kind(config.action_profile),
            config,
            ports,
            scroll,
            clicks: ClickRecognizer::with_level(sample.pressed),
            orchestrator: Orchestrator::new(now_ms, link),
            last_sample: sample,
            recovering: false,
        })
    }

    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    pub fn power_state(&self) -> PowerState {
        self.orchestrator.state()
    }

    pub fn link_state(&self) -> LinkState {
        link_state(&self.ports.hid)
    }

    pub fn ports(&self) -> &Ports<I, H, P, B, L> {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut Ports<I, H, P, B, L> {
        &mut self.ports
    }

    /// Run one tick at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let mut report = TickReport::new();

        if self.orchestrator.state() == PowerState::SleepRequested {
            report.outcome = TickOutcome::Asleep;
            return report;
        }

        let link = self.link_state();

        // While armed the encoder stays released; recovery waits for the
        // session to be awake again.
        let awake = self.orchestrator.state() == PowerState::Awake;
        if self.recovering && awake {
            self.reinit_input(&mut report);
        }
        let (sample, fresh) = self.read_input(&mut report);

        let (scroll, click) = match self.orchestrator.state() {
            PowerState::Awake => (
                // A stale position must not become the baseline.
                if fresh {
                    self.scroll
                        .update(now_ms, sample.ticks, self.config.scroll_batching_delay_ms)
                } else {
                    ScrollUpdate::default()
                },
                self.clicks.update(now_ms, sample.pressed, &self.click_timing),
            ),
            PowerState::ArmedForSleep => (
                ScrollUpdate::default(),
                ClickUpdate {
                    release_edge: self.clicks.track_release(sample.pressed),
                    ..ClickUpdate::default()
                },
            ),
            PowerState::SleepRequested => (ScrollUpdate::default(), ClickUpdate::default()),
        };

        let eval = self.orchestrator.evaluate(
            now_ms,
            OrchestratorInput {
                activity: scroll.moved || click.press_edge,
                long_press: click.long_press,
                release_edge: click.release_edge,
                link,
            },
            &self.power_timing,
        );

        match eval.link_edge {
            Some(LinkEdge::Up) => report.note(Notice::LinkUp),
            Some(LinkEdge::Down) => report.note(Notice::LinkDown),
            None => {}
        }
        if let Some((from, to)) = eval.transition {
            report.note(Notice::PowerTransition { from, to });
        }

        self.dispatch_events(&scroll, &click, link, &mut report);

        for directive in eval.directives {
            if let Some(outcome) = self.execute(directive, now_ms, &mut report) {
                report.outcome = outcome;
                return report;
            }
        }

        let link = self.link_state();
        self.ports
            .indicator
            .set(status_led_on(now_ms, link, self.orchestrator.state()));
        report.outcome = TickOutcome::Continue {
            delay_ms: self.orchestrator.loop_delay_ms(link, &self.power_timing),
        };
        report
    }

    /// This tick's sample and whether it was actually read.
    fn read_input(&mut self, report: &mut TickReport) -> (RawSample, bool) {
        match self.ports.input.read() {
            Ok(sample) => {
                self.last_sample = sample;
                (sample, true)
            }
            Err(e) => {
                report.fault(e);
                self.recovering = true;
                if self.orchestrator.state() == PowerState::Awake {
                    self.reinit_input(report);
                }
                (self.last_sample, false)
            }
        }
    }

    fn reinit_input(&mut self, report: &mut TickReport) {
        match self.ports.input.reinit() {
            Ok(()) => {
                self.recovering = false;
                // The decoder counter restarted.
                self.scroll.rebaseline();
                report.note(Notice::InputRecovered);
            }
            Err(e) => report.fault(e),
        }
    }

    /// Classified events of this tick, in order: reversal flush, batch
    /// flush, click, long-press acknowledgment.
    fn dispatch_events(
        &mut self,
        scroll: &ScrollUpdate,
        click: &ClickUpdate,
        link: LinkState,
        report: &mut TickReport,
    ) {
        if let Some(ev) = scroll.reversal {
            report.note(Notice::ReversalFlush(ev));
        }
        if let Some(ev) = click.click {
            report.note(Notice::Click(ev));
        }
        if click.long_press {
            report.note(Notice::LongPress);
        }

        let threshold = self.config.gesture_threshold;
        let scroll_events = scroll
            .events()
            .flat_map(|ev| expand_scroll(ev, threshold).events());
        let click_events = click
            .click
            .map(InputEvent::Click)
            .into_iter()
            .chain(click.long_press.then_some(InputEvent::LongPressAck));

        for event in scroll_events.chain(click_events) {
            let Some(action) = dispatch(event, link, &self.profile) else {
                continue;
            };
            match self.ports.hid.dispatch(&action) {
                Ok(()) => report.note(Notice::Dispatched(event)),
                Err(e) => {
                    // The rest of this tick's output is dropped.
                    report.fault(e);
                    return;
                }
            }
        }
    }

    /// Carry out one directive.  Returns an outcome when the tick must end
    /// here.
    fn execute(&mut self, directive: Directive, now_ms: u64, report: &mut TickReport) -> Option<TickOutcome> {
        match directive {
            Directive::StartAdvertising => match self.ports.hid.start_advertising() {
                Ok(()) => report.note(Notice::AdvertisingStarted),
                Err(e) => report.fault(e),
            },
            Directive::RefreshBattery => self.refresh_battery(report),
            Directive::Acknowledge => self.ports.indicator.acknowledge(),
            Directive::ReleasePeripherals => {
                self.ports.input.release_encoder();
                self.ports.battery.release();
                self.scroll.clear();
                self.clicks.suppress();
            }
            Directive::TearDownLink => {
                let disconnected = self.ports.hid.disconnect_all();
                let stopped = self.ports.hid.stop_advertising();
                for result in [disconnected, stopped] {
                    if let Err(e) = result {
                        report.fault(e);
                        self.orchestrator.teardown_failed();
                    }
                }
            }
            Directive::EnterDeepSleep(wake) => return Some(self.enter_deep_sleep(wake, now_ms, report)),
        }
        None
    }

    fn refresh_battery(&mut self, report: &mut TickReport) {
        let reading = match self.ports.battery.sample() {
            Ok(reading) => reading,
            Err(e) => {
                report.fault(e);
                self.orchestrator.battery_refresh_failed();
                return;
            }
        };
        match self.ports.hid.set_battery_level(reading.percent) {
            Ok(()) => report.note(Notice::BatteryRefreshed(reading)),
            Err(e) => {
                report.fault(e);
                self.orchestrator.battery_refresh_failed();
            }
        }
    }

    fn enter_deep_sleep(&mut self, wake: WakeSources, now_ms: u64, report: &mut TickReport) -> TickOutcome {
        self.ports.input.release_all();
        self.ports.battery.release();
        self.ports.indicator.set(false);
        report.note(Notice::SleepRequested(wake));

        match self.ports.power.enter_deep_sleep(wake) {
            Ok(()) => TickOutcome::Asleep,
            Err(e) => {
                report.fault(e);
                let from = self.orchestrator.state();
                self.orchestrator.sleep_failed(now_ms);
                report.note(Notice::PowerTransition {
                    from,
                    to: self.orchestrator.state(),
                });

                // Inputs were released; bring them back next tick.
                self.recovering = true;
                self.scroll.clear();
                self.clicks = ClickRecognizer::with_level(self.last_sample.pressed);

                TickOutcome::Continue {
                    delay_ms: self.config.sleep_retry_delay_ms,
                }
            }
        }
    }
}

fn link_state<H: HidSink>(hid: &H) -> LinkState {
    LinkState::from_flags(hid.is_connected(), hid.is_advertising())
}
