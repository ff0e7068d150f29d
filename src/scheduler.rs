//! Scheduler tick - the single owner of all runtime state.
//!
//! One [`Scheduler::tick`] per millisecond:
//!
//! 1. let the classifier run its hold / settle timers;
//! 2. drain the radio event queue (link events → [`LinkManager`],
//!    notifications → decoder → classifier → outputs);
//! 3. let the link manager run its timers.
//!
//! A hold that is due at this millisecond has started before any release
//! drained in the same tick is classified.
//!
//! Radio callbacks only ever push onto the queue, so nothing they do can
//! interleave with a half-finished transition here.

use embedded_hal::digital::OutputPin;

use crate::ble::link::{LinkManager, LinkSignal};
use crate::ble::{EventSource, Radio, RadioEvent};
use crate::config::{Config, EVENT_QUEUE_DEPTH};
use crate::decoder::NotificationDecoder;
use crate::gesture::{GestureClassifier, GestureEvent};
use crate::output::OutputActuator;

pub struct Scheduler<F, S> {
    link: LinkManager,
    decoder: NotificationDecoder,
    classifier: GestureClassifier,
    output: OutputActuator<F, S>,
    ticks: u32,
    last_tick_ms: Option<u64>,
}

impl<F: OutputPin, S: OutputPin> Scheduler<F, S> {
    pub fn new(config: Config, output: OutputActuator<F, S>) -> Self {
        Self {
            link: LinkManager::new(config.link),
            decoder: NotificationDecoder::new(config.classifier.encoding),
            classifier: GestureClassifier::new(config.classifier),
            output,
            ticks: 0,
            last_tick_ms: None,
        }
    }

    pub fn link(&self) -> &LinkManager {
        &self.link
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn output(&self) -> &OutputActuator<F, S> {
        &self.output
    }

    /// Number of ticks executed so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Run one tick at `now_ms`.  A second call within the same
    /// millisecond does nothing and returns `false`.
    pub fn tick<R: Radio, E: EventSource>(
        &mut self,
        now_ms: u64,
        radio: &mut R,
        events: &mut E,
    ) -> bool {
        if self.last_tick_ms == Some(now_ms) {
            return false;
        }
        self.last_tick_ms = Some(now_ms);

        let gestures = self.classifier.poll(now_ms);
        self.drive(&gestures);

        // Bounded so a chatty radio cannot starve the timers.
        for _ in 0..EVENT_QUEUE_DEPTH {
            let Some(event) = events.next_event() else {
                break;
            };
            self.dispatch(event, now_ms, radio);
        }

        self.link.poll(now_ms, self.ticks, radio);

        self.ticks = self.ticks.wrapping_add(1);
        true
    }

    fn dispatch<R: Radio>(&mut self, event: RadioEvent, now_ms: u64, radio: &mut R) {
        if let RadioEvent::Notification { handle, data } = &event {
            if !self.link.accepts_notification(*handle) {
                return;
            }
            if let Some(sample) = self.decoder.decode(data, now_ms) {
                let gestures = self.classifier.on_sample(sample);
                self.drive(&gestures);
            }
            return;
        }

        match self.link.handle_event(&event, now_ms, radio) {
            Some(LinkSignal::Ready) => info!("device ready"),
            Some(LinkSignal::Lost) => {
                // The release edge will never arrive; do not leave a line high.
                let gestures = self.classifier.reset(now_ms);
                self.drive(&gestures);
                if let Err(e) = self.output.release_all() {
                    warn!("release on link loss: {}", e);
                }
            }
            None => {}
        }
    }

    fn drive(&mut self, gestures: &[GestureEvent]) {
        for &gesture in gestures {
            if let Err(e) = self.output.apply(gesture) {
                warn!("{}: {}", gesture.as_str(), e);
            }
        }
    }
}
