//! Gesture classifier - turns press/release timing into focus, shutter and
//! hold actions.
//!
//! ## Classification
//!
//! | Press duration (`held`)          | Action on release                |
//! |----------------------------------|----------------------------------|
//! | `held < focus_threshold`         | focus pulse                      |
//! | `held <= hold_threshold`         | shutter pulse                    |
//! | longer                           | ends the hold started while held |
//!
//! If no poll saw the hold start, the release reports the whole hold at
//! once.  A hold starts from [`GestureClassifier::poll`] as soon as the button has
//! been down longer than `hold_threshold`.  Focus and shutter pulses stay
//! asserted until `release_settle` has passed since the releasing edge.
//!
//! At most one of focus / shutter / hold is active at any time: every start
//! goes through [`GestureClassifier::start`], which first stops whatever is
//! still active.

use heapless::Vec;

use crate::decoder::{ButtonSample, LevelEncoding};
use crate::output::Line;

/// Whether a threshold value itself belongs to the shorter class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Boundary {
    /// `value < limit`
    Exclusive,
    /// `value <= limit`
    Inclusive,
}

impl Boundary {
    pub const fn admits(self, value: u64, limit: u64) -> bool {
        match self {
            Boundary::Exclusive => value < limit,
            Boundary::Inclusive => value <= limit,
        }
    }
}

/// Timing policy.  [`crate::config::Config::DEFAULT`] holds the canonical
/// values (350 / 50 / 50 ms, focus exclusive, shutter inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub hold_threshold_ms: u64,
    pub focus_threshold_ms: u64,
    pub release_settle_ms: u64,
    /// How a notification byte maps to pressed/released.
    pub encoding: LevelEncoding,
    pub focus_boundary: Boundary,
    pub shutter_boundary: Boundary,
}

/// Semantic events, each mapped onto one output line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GestureEvent {
    FocusStart,
    FocusStop,
    ShutterStart,
    ShutterStop,
    HoldStart,
    HoldStop,
}

impl GestureEvent {
    /// Output line this event drives.  A hold keeps the shutter open.
    pub const fn line(self) -> Line {
        match self {
            GestureEvent::FocusStart | GestureEvent::FocusStop => Line::Focus,
            _ => Line::Shutter,
        }
    }

    /// `true` for start events (assert), `false` for stop events.
    pub const fn asserts(self) -> bool {
        matches!(
            self,
            GestureEvent::FocusStart | GestureEvent::ShutterStart | GestureEvent::HoldStart
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            GestureEvent::FocusStart => "Focus action start.",
            GestureEvent::FocusStop => "Focus action stop.",
            GestureEvent::ShutterStart => "Shutter action start.",
            GestureEvent::ShutterStop => "Shutter action stop.",
            GestureEvent::HoldStart => "Button hold action start.",
            GestureEvent::HoldStop => "Button hold action stop.",
        }
    }
}

/// Events produced by one classifier call.
pub type GestureEvents = Vec<GestureEvent, 4>;

/// Classifier memory.  Only the current and previous level are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GestureState {
    pub level: bool,
    pub previous_level: bool,
    /// Timestamp of the most recent press or release edge (ms).
    pub last_transition_ms: u64,
    pub hold_active: bool,
    pub focus_active: bool,
    pub shutter_active: bool,
}

impl GestureState {
    /// At most one action is active.
    pub fn is_exclusive(&self) -> bool {
        (self.hold_active as u8 + self.focus_active as u8 + self.shutter_active as u8) <= 1
    }
}

enum Release {
    Focus,
    Shutter,
    Hold,
}

pub struct GestureClassifier {
    config: ClassifierConfig,
    state: GestureState,
}

impl GestureClassifier {
    pub const fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: GestureState {
                level: false,
                previous_level: false,
                last_transition_ms: 0,
                hold_active: false,
                focus_active: false,
                shutter_active: false,
            },
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Feed one decoded sample.  Only level changes do anything; the
    /// sample's own timestamp marks the edge.
    pub fn on_sample(&mut self, sample: ButtonSample) -> GestureEvents {
        let mut out = GestureEvents::new();
        self.state.level = sample.pressed;
        if self.state.level == self.state.previous_level {
            return out;
        }
        self.state.previous_level = self.state.level;

        if sample.pressed {
            // Decision is made on release or on hold timeout.  A pulse
            // still settling from the previous gesture ends here.
            self.stop_active(&mut out);
        } else {
            let held_for = sample
                .timestamp_ms
                .saturating_sub(self.state.last_transition_ms);
            match self.classify(held_for) {
                Release::Focus => self.start(&mut out, GestureEvent::FocusStart),
                Release::Shutter => self.start(&mut out, GestureEvent::ShutterStart),
                Release::Hold if self.state.hold_active => {
                    self.emit(&mut out, GestureEvent::HoldStop)
                }
                // The hold never started between two polls; still report
                // one complete hold.
                Release::Hold => {
                    self.start(&mut out, GestureEvent::HoldStart);
                    self.emit(&mut out, GestureEvent::HoldStop);
                }
            }
        }
        self.state.last_transition_ms = sample.timestamp_ms;
        out
    }

    /// Time-based transitions; call once per tick.
    pub fn poll(&mut self, now_ms: u64) -> GestureEvents {
        let mut out = GestureEvents::new();
        let elapsed = now_ms.saturating_sub(self.state.last_transition_ms);

        if self.state.level {
            let past_hold = !self
                .config
                .shutter_boundary
                .admits(elapsed, self.config.hold_threshold_ms);
            if past_hold && !self.state.hold_active {
                self.start(&mut out, GestureEvent::HoldStart);
            }
        } else if elapsed > self.config.release_settle_ms {
            if self.state.focus_active {
                self.emit(&mut out, GestureEvent::FocusStop);
            } else if self.state.shutter_active {
                self.emit(&mut out, GestureEvent::ShutterStop);
            }
        }
        out
    }

    /// Forget the button and stop any active action, e.g. when the link
    /// drops while the button is held.
    pub fn reset(&mut self, now_ms: u64) -> GestureEvents {
        let mut out = GestureEvents::new();
        self.stop_active(&mut out);
        self.state.level = false;
        self.state.previous_level = false;
        self.state.last_transition_ms = now_ms;
        out
    }

    fn classify(&self, held_for: u64) -> Release {
        let c = &self.config;
        if c.focus_boundary.admits(held_for, c.focus_threshold_ms) {
            Release::Focus
        } else if c.shutter_boundary.admits(held_for, c.hold_threshold_ms) {
            Release::Shutter
        } else {
            Release::Hold
        }
    }

    fn start(&mut self, out: &mut GestureEvents, event: GestureEvent) {
        self.stop_active(out);
        self.emit(out, event);
    }

    fn stop_active(&mut self, out: &mut GestureEvents) {
        if self.state.focus_active {
            self.emit(out, GestureEvent::FocusStop);
        }
        if self.state.shutter_active {
            self.emit(out, GestureEvent::ShutterStop);
        }
        if self.state.hold_active {
            self.emit(out, GestureEvent::HoldStop);
        }
    }

    fn emit(&mut self, out: &mut GestureEvents, event: GestureEvent) {
        let s = &mut self.state;
        match event {
            GestureEvent::FocusStart => s.focus_active = true,
            GestureEvent::FocusStop => s.focus_active = false,
            GestureEvent::ShutterStart => s.shutter_active = true,
            GestureEvent::ShutterStop => s.shutter_active = false,
            GestureEvent::HoldStart => s.hold_active = true,
            GestureEvent::HoldStop => s.hold_active = false,
        }
        debug_assert!(s.is_exclusive(), "more than one action active");
        info!("{}", event.as_str());
        // Capacity covers the worst case: one stop, then a start/stop pair.
        let _ = out.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::vec::Vec as StdVec;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(Config::DEFAULT.classifier)
    }

    fn press(t: u64) -> ButtonSample {
        ButtonSample {
            pressed: true,
            timestamp_ms: t,
        }
    }

    fn release(t: u64) -> ButtonSample {
        ButtonSample {
            pressed: false,
            timestamp_ms: t,
        }
    }

    /// Poll every millisecond in `from..=to`, collecting events.
    fn poll_range(c: &mut GestureClassifier, from: u64, to: u64) -> StdVec<(u64, GestureEvent)> {
        let mut seen = StdVec::new();
        for t in from..=to {
            for e in c.poll(t) {
                seen.push((t, e));
            }
            assert!(c.state().is_exclusive());
        }
        seen
    }

    #[test]
    fn quick_tap_is_focus() {
        let mut c = classifier();
        assert!(c.on_sample(press(1000)).is_empty());
        assert!(poll_range(&mut c, 1000, 1029).is_empty());

        let out = c.on_sample(release(1030));
        assert_eq!(out.as_slice(), [GestureEvent::FocusStart]);
        assert!(c.state().focus_active);

        let later = poll_range(&mut c, 1030, 1200);
        assert_eq!(later, [(1081, GestureEvent::FocusStop)]);
        assert!(!c.state().focus_active);
    }

    #[test]
    fn medium_press_is_shutter() {
        let mut c = classifier();
        c.on_sample(press(1000));
        assert!(poll_range(&mut c, 1000, 1199).is_empty());

        let out = c.on_sample(release(1200));
        assert_eq!(out.as_slice(), [GestureEvent::ShutterStart]);

        let later = poll_range(&mut c, 1200, 1400);
        assert_eq!(later, [(1251, GestureEvent::ShutterStop)]);
    }

    #[test]
    fn long_press_starts_hold_once_after_threshold() {
        let mut c = classifier();
        c.on_sample(press(1000));
        let seen = poll_range(&mut c, 1000, 1500);
        assert_eq!(seen, [(1351, GestureEvent::HoldStart)]);
        assert!(c.state().hold_active);
    }

    #[test]
    fn release_after_hold_stops_hold() {
        let mut c = classifier();
        c.on_sample(press(1000));
        poll_range(&mut c, 1000, 1400);

        let out = c.on_sample(release(1400));
        assert_eq!(out.as_slice(), [GestureEvent::HoldStop]);
        assert!(!c.state().hold_active);

        // Nothing left to settle.
        assert!(poll_range(&mut c, 1400, 1600).is_empty());
    }

    #[test]
    fn boundaries_pick_one_branch() {
        // Exactly the focus threshold is already a shutter.
        let mut c = classifier();
        c.on_sample(press(0));
        assert_eq!(
            c.on_sample(release(50)).as_slice(),
            [GestureEvent::ShutterStart]
        );

        // 49 ms is still focus.
        let mut c = classifier();
        c.on_sample(press(0));
        assert_eq!(c.on_sample(release(49)).as_slice(), [GestureEvent::FocusStart]);

        // Exactly the hold threshold is still a shutter, and no hold fired.
        let mut c = classifier();
        c.on_sample(press(0));
        assert!(poll_range(&mut c, 0, 350).is_empty());
        assert_eq!(
            c.on_sample(release(350)).as_slice(),
            [GestureEvent::ShutterStart]
        );
    }

    #[test]
    fn inclusive_focus_boundary_is_selectable() {
        let mut config = Config::DEFAULT.classifier;
        config.focus_boundary = Boundary::Inclusive;
        config.shutter_boundary = Boundary::Exclusive;
        let mut c = GestureClassifier::new(config);

        c.on_sample(press(0));
        assert_eq!(c.on_sample(release(50)).as_slice(), [GestureEvent::FocusStart]);

        // With an exclusive shutter boundary the hold starts at 350 ms.
        let mut c = GestureClassifier::new(config);
        c.on_sample(press(0));
        assert_eq!(poll_range(&mut c, 0, 400), [(350, GestureEvent::HoldStart)]);
    }

    #[test]
    fn repeated_samples_at_same_level_are_ignored() {
        let mut c = classifier();
        c.on_sample(press(0));
        assert!(c.on_sample(press(20)).is_empty());
        assert!(c.on_sample(press(40)).is_empty());
        // Duration still measured from the first press.
        assert_eq!(
            c.on_sample(release(45)).as_slice(),
            [GestureEvent::FocusStart]
        );
        assert!(c.on_sample(release(60)).is_empty());
    }

    #[test]
    fn new_press_ends_settling_pulse() {
        let mut c = classifier();
        c.on_sample(press(0));
        c.on_sample(release(20));
        assert!(c.state().focus_active);

        let out = c.on_sample(press(40));
        assert_eq!(out.as_slice(), [GestureEvent::FocusStop]);

        // Holding the new press cannot overlap the old focus.
        let seen = poll_range(&mut c, 40, 500);
        assert_eq!(seen, [(391, GestureEvent::HoldStart)]);
        assert!(c.state().is_exclusive());
    }

    #[test]
    fn release_past_hold_without_poll_is_a_hold() {
        let mut c = classifier();
        c.on_sample(press(0));
        // No poll in between.
        assert_eq!(
            c.on_sample(release(600)).as_slice(),
            [GestureEvent::HoldStart, GestureEvent::HoldStop]
        );
        let state = c.state();
        assert!(!state.hold_active && !state.shutter_active && !state.focus_active);
        assert!(poll_range(&mut c, 600, 800).is_empty());
    }

    #[test]
    fn release_one_past_threshold_stops_hold() {
        let mut c = classifier();
        c.on_sample(press(0));
        poll_range(&mut c, 0, 350);
        assert!(!c.state().hold_active);
        assert_eq!(c.poll(351).as_slice(), [GestureEvent::HoldStart]);
        assert_eq!(
            c.on_sample(release(351)).as_slice(),
            [GestureEvent::HoldStop]
        );
    }

    #[test]
    fn reset_stops_active_hold() {
        let mut c = classifier();
        c.on_sample(press(0));
        poll_range(&mut c, 0, 400);
        assert!(c.state().hold_active);

        assert_eq!(c.reset(500).as_slice(), [GestureEvent::HoldStop]);
        assert!(!c.state().level);
        assert!(poll_range(&mut c, 500, 1500).is_empty());
    }

    #[test]
    fn mutual_exclusion_over_random_sequences() {
        // Small xorshift so the sequence is deterministic.
        let mut seed: u32 = 0x1234_5678;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };

        let mut c = classifier();
        let mut t = 0u64;
        let mut pressed = false;
        for _ in 0..2000 {
            let step = (next() % 500) as u64;
            for _ in 0..step {
                t += 1;
                c.poll(t);
                assert!(c.state().is_exclusive());
            }
            pressed = !pressed;
            c.on_sample(ButtonSample {
                pressed,
                timestamp_ms: t,
            });
            assert!(c.state().is_exclusive());
        }
    }

    #[test]
    fn events_map_to_lines() {
        assert_eq!(GestureEvent::FocusStart.line(), Line::Focus);
        assert_eq!(GestureEvent::HoldStart.line(), Line::Shutter);
        assert_eq!(GestureEvent::ShutterStop.line(), Line::Shutter);
        assert!(GestureEvent::HoldStart.asserts());
        assert!(!GestureEvent::HoldStop.asserts());
    }
}
