//! Button click-pattern recognizer.
//!
//! Tracks press/release edges of the single dial button and classifies
//! them into single, double and triple clicks, plus a long-press signal
//! for the power orchestrator.
//!
//! A run of one or two clicks can only be classified once the double-click
//! window has passed without a follow-up release, so single and double
//! clicks are reported in arrears at `last release + window`.  Three clicks
//! is the longest run tracked and is reported on the third release.

/// Timing parameters for the recognizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickTiming {
    pub long_press_ms: u64,
    pub double_click_window_ms: u64,
}

/// Classified click run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClickEvent {
    Single,
    Double,
    Triple,
}

/// Press currently in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PressRun {
    pub press_start_ms: Option<u64>,
}

/// Clicks collected within the double-click window.
///
/// Invariant: `count` is back to 0 as soon as the run has been reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClickRun {
    pub count: u8,
    pub last_click_ms: Option<u64>,
    pub pending_confirmation_deadline: Option<u64>,
}

impl ClickRun {
    fn reset(&mut self) {
        self.count = 0;
        self.pending_confirmation_deadline = None;
    }
}

/// Result of one [`ClickRecognizer::update`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClickUpdate {
    /// Button went down this tick (counts as user activity).
    pub press_edge: bool,
    /// Button came up this tick.
    pub release_edge: bool,
    /// The hold crossed the long-press threshold this tick.
    pub long_press: bool,
    /// A click run was classified this tick.
    pub click: Option<ClickEvent>,
}

/// Edge-driven click classifier.
#[derive(Clone, Debug, Default)]
pub struct ClickRecognizer {
    was_pressed: bool,
    press: PressRun,
    run: ClickRun,
    long_press_signalled: bool,
}

impl ClickRecognizer {
    pub const fn new() -> Self {
        Self {
            was_pressed: false,
            press: PressRun {
                press_start_ms: None,
            },
            run: ClickRun {
                count: 0,
                last_click_ms: None,
                pending_confirmation_deadline: None,
            },
            long_press_signalled: false,
        }
    }

    /// Seed the previous button level without producing an edge.
    ///
    /// A button already held at boot (the wake press) is not a new press.
    pub fn with_level(pressed: bool) -> Self {
        Self {
            was_pressed: pressed,
            ..Self::new()
        }
    }

    pub fn press_run(&self) -> &PressRun {
        &self.press
    }

    pub fn click_run(&self) -> &ClickRun {
        &self.run
    }

    /// Feed the debounced button state sampled at `now_ms`.
    pub fn update(&mut self, now_ms: u64, pressed: bool, timing: &ClickTiming) -> ClickUpdate {
        let mut out = ClickUpdate::default();

        // Confirmation runs first: a release landing on an expired
        // deadline must not restart a run that was never reported.
        if let Some(deadline) = self.run.pending_confirmation_deadline {
            if now_ms >= deadline {
                out.click = match self.run.count {
                    1 => Some(ClickEvent::Single),
                    2 => Some(ClickEvent::Double),
                    _ => None,
                };
                self.run.reset();
            }
        }

        let press_edge = pressed && !self.was_pressed;
        let release_edge = !pressed && self.was_pressed;
        self.was_pressed = pressed;

        if press_edge && self.press.press_start_ms.is_none() {
            self.press.press_start_ms = Some(now_ms);
            self.long_press_signalled = false;
            out.press_edge = true;
        }

        if pressed {
            if let Some(start) = self.press.press_start_ms {
                if !self.long_press_signalled
                    && now_ms.saturating_sub(start) >= timing.long_press_ms
                {
                    self.signal_long_press(&mut out);
                }
            }
        }

        if release_edge {
            out.release_edge = true;
            if let Some(start) = self.press.press_start_ms.take() {
                let held = now_ms.saturating_sub(start);
                if self.long_press_signalled {
                    // Already handed to the orchestrator.
                } else if held >= timing.long_press_ms {
                    // Threshold crossed between two polls.
                    self.signal_long_press(&mut out);
                } else {
                    out.click = out.click.or(self.register_click(now_ms, timing));
                }
            }
            self.long_press_signalled = false;
        }

        out
    }

    /// Count a short release and report a triple click immediately.
    fn register_click(&mut self, now_ms: u64, timing: &ClickTiming) -> Option<ClickEvent> {
        let continues = self
            .run
            .last_click_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < timing.double_click_window_ms);

        self.run.count = if continues { self.run.count + 1 } else { 1 };
        self.run.last_click_ms = Some(now_ms);

        if self.run.count >= 3 {
            self.run.reset();
            Some(ClickEvent::Triple)
        } else {
            self.run.pending_confirmation_deadline = Some(now_ms + timing.double_click_window_ms);
            None
        }
    }

    /// A long press is not a click: drop whatever run was pending.
    fn signal_long_press(&mut self, out: &mut ClickUpdate) {
        self.long_press_signalled = true;
        self.run.reset();
        out.long_press = true;
    }

    /// Forget the press and click runs.
    ///
    /// Called when the orchestrator arms for sleep; from then on only
    /// [`track_release`](Self::track_release) is used.
    pub fn suppress(&mut self) {
        self.press = PressRun::default();
        self.run.reset();
        self.long_press_signalled = false;
    }

    /// Level tracking only: returns `true` on a release edge.
    pub fn track_release(&mut self, pressed: bool) -> bool {
        let release_edge = !pressed && self.was_pressed;
        self.was_pressed = pressed;
        release_edge
    }
}
