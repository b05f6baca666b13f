//! Encoder scroll batching.
//!
//! Raw encoder deltas are summed into a [`ScrollAccumulator`] and flushed
//! as a single [`ScrollEvent`] once the dial has been still for the
//! batching delay, or immediately when the rotation direction reverses.
//! A reversal flush always happens before the new delta is accepted, so a
//! change of direction is never folded into the wrong-signed total.

/// Rotation direction, from the sign of the encoder delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    /// Direction of a non-zero delta; `None` for zero.
    pub fn of(delta: i32) -> Option<Self> {
        match delta {
            d if d > 0 => Some(Direction::Positive),
            d if d < 0 => Some(Direction::Negative),
            _ => None,
        }
    }
}

/// One flushed batch of encoder motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScrollEvent {
    pub direction: Direction,
    pub magnitude: u32,
}

/// Buffered encoder motion.
///
/// Invariant: while `buffered_delta != 0` its sign matches
/// `last_direction`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollAccumulator {
    pub buffered_delta: i32,
    pub last_direction: Option<Direction>,
    /// Start of the current batching window; restarted on every accepted
    /// delta.
    pub last_flush_ms: u64,
}

impl ScrollAccumulator {
    /// Emit the buffer as an event and zero it.
    fn flush(&mut self) -> Option<ScrollEvent> {
        let direction = Direction::of(self.buffered_delta)?;
        let magnitude = self.buffered_delta.unsigned_abs();
        self.buffered_delta = 0;
        Some(ScrollEvent {
            direction,
            magnitude,
        })
    }
}

/// Result of one [`ScrollClassifier::update`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollUpdate {
    /// The encoder moved this tick (counts as user activity).
    pub moved: bool,
    /// Buffer flushed early because the direction reversed.
    pub reversal: Option<ScrollEvent>,
    /// Buffer flushed because the batching delay elapsed.
    pub flushed: Option<ScrollEvent>,
}

impl ScrollUpdate {
    /// Flushed events in emission order.
    pub fn events(&self) -> impl Iterator<Item = ScrollEvent> {
        self.reversal.into_iter().chain(self.flushed)
    }
}

/// Turns absolute encoder positions into batched [`ScrollEvent`]s.
#[derive(Clone, Debug, Default)]
pub struct ScrollClassifier {
    prev_ticks: Option<i32>,
    acc: ScrollAccumulator,
}

impl ScrollClassifier {
    pub const fn new() -> Self {
        Self {
            prev_ticks: None,
            acc: ScrollAccumulator {
                buffered_delta: 0,
                last_direction: None,
                last_flush_ms: 0,
            },
        }
    }

    /// Current buffer state.
    pub fn accumulator(&self) -> &ScrollAccumulator {
        &self.acc
    }

    /// Feed the absolute encoder position sampled at `now_ms`.
    pub fn update(&mut self, now_ms: u64, ticks: i32, batching_delay_ms: u64) -> ScrollUpdate {
        let mut out = ScrollUpdate::default();

        let delta = match self.prev_ticks.replace(ticks) {
            Some(prev) => ticks.wrapping_sub(prev),
            None => 0,
        };

        if let Some(direction) = Direction::of(delta) {
            if self.acc.last_direction != Some(direction) && self.acc.buffered_delta != 0 {
                out.reversal = self.acc.flush();
            }
            self.acc.buffered_delta = self.acc.buffered_delta.saturating_add(delta);
            self.acc.last_direction = Some(direction);
            self.acc.last_flush_ms = now_ms;
            out.moved = true;
        }

        if self.acc.buffered_delta != 0
            && now_ms.saturating_sub(self.acc.last_flush_ms) >= batching_delay_ms
        {
            out.flushed = self.acc.flush();
        }

        out
    }

    /// Forget the previous position; the next sample becomes the baseline.
    ///
    /// Used after the encoder peripheral has been re-initialised and its
    /// counter restarted.
    pub fn rebaseline(&mut self) {
        self.prev_ticks = None;
    }

    /// Drop any buffered motion without emitting it.
    pub fn clear(&mut self) {
        self.acc.buffered_delta = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: u64 = 200;

    fn primed(ticks: i32) -> ScrollClassifier {
        let mut c = ScrollClassifier::new();
        let first = c.update(0, ticks, DELAY);
        assert_eq!(first, ScrollUpdate::default());
        c
    }

    #[test]
    fn first_sample_is_baseline_only() {
        let mut c = ScrollClassifier::new();
        let out = c.update(0, 1234, DELAY);
        assert!(!out.moved);
        assert_eq!(c.accumulator().buffered_delta, 0);
    }

    #[test]
    fn no_motion_leaves_buffer_untouched() {
        let mut c = primed(5);
        c.update(10, 7, DELAY);
        let out = c.update(20, 7, DELAY);
        assert!(!out.moved);
        assert_eq!(c.accumulator().buffered_delta, 2);
    }

    #[test]
    fn flushes_after_batching_delay() {
        let mut c = primed(0);
        c.update(10, 1, DELAY);
        c.update(50, 2, DELAY);
        assert_eq!(c.update(249, 2, DELAY).flushed, None);

        let out = c.update(250, 2, DELAY);
        assert_eq!(
            out.flushed,
            Some(ScrollEvent {
                direction: Direction::Positive,
                magnitude: 2
            })
        );
        assert_eq!(c.accumulator().buffered_delta, 0);
    }

    #[test]
    fn each_delta_restarts_the_batching_window() {
        let mut c = primed(0);
        c.update(0, 1, DELAY);
        c.update(150, 2, DELAY);
        assert_eq!(c.update(300, 2, DELAY).flushed, None);
        assert!(c.update(350, 2, DELAY).flushed.is_some());
    }

    #[test]
    fn reversal_flushes_before_accepting_new_delta() {
        let mut c = primed(0);
        c.update(10, 2, DELAY);
        let out = c.update(20, 1, DELAY);

        assert!(out.moved);
        assert_eq!(
            out.reversal,
            Some(ScrollEvent {
                direction: Direction::Positive,
                magnitude: 2
            })
        );
        assert_eq!(out.flushed, None);
        assert_eq!(c.accumulator().buffered_delta, -1);
        assert_eq!(c.accumulator().last_direction, Some(Direction::Negative));
    }

    #[test]
    fn reversal_after_empty_buffer_does_not_flush() {
        let mut c = primed(0);
        c.update(0, 3, DELAY);
        c.update(200, 3, DELAY); // timed flush
        let out = c.update(210, 1, DELAY);
        assert_eq!(out.reversal, None);
        assert_eq!(c.accumulator().buffered_delta, -2);
    }

    #[test]
    fn buffer_sign_matches_last_direction() {
        let mut c = primed(0);
        let positions = [1, 3, 2, 0, 4, 5, 5, 1, -3];
        for (i, &p) in positions.iter().enumerate() {
            c.update(i as u64 * 20, p, DELAY);
            let acc = c.accumulator();
            if acc.buffered_delta != 0 {
                assert_eq!(Direction::of(acc.buffered_delta), acc.last_direction);
            }
        }
    }

    #[test]
    fn flushed_totals_conserve_raw_deltas() {
        let mut c = primed(0);
        let positions = [2, 5, 4, 3, 3, 8, 9, 1, 0, 0, 0, 6];
        let mut prev = 0;
        let (mut raw_pos, mut raw_neg) = (0u32, 0u32);
        let (mut out_pos, mut out_neg) = (0u32, 0u32);

        for (i, &p) in positions.iter().enumerate() {
            let d: i32 = p - prev;
            prev = p;
            if d > 0 {
                raw_pos += d as u32;
            } else {
                raw_neg += d.unsigned_abs();
            }
            for ev in c.update(i as u64 * 50, p, DELAY).events() {
                match ev.direction {
                    Direction::Positive => out_pos += ev.magnitude,
                    Direction::Negative => out_neg += ev.magnitude,
                }
            }
        }
        for ev in c.update(10_000, prev, DELAY).events() {
            match ev.direction {
                Direction::Positive => out_pos += ev.magnitude,
                Direction::Negative => out_neg += ev.magnitude,
            }
        }

        assert_eq!(out_pos, raw_pos);
        assert_eq!(out_neg, raw_neg);
    }

    #[test]
    fn wrapping_position_yields_small_delta() {
        let mut c = primed(i32::MAX);
        c.update(10, i32::MIN, DELAY);
        assert_eq!(c.accumulator().buffered_delta, 1);
    }

    #[test]
    fn rebaseline_ignores_counter_restart() {
        let mut c = primed(40);
        c.rebaseline();
        let out = c.update(10, 0, DELAY);
        assert!(!out.moved);
        assert_eq!(c.accumulator().buffered_delta, 0);
    }
}
