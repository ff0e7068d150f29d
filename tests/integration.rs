//! End-to-end tests: scheduler + link manager + classifier + outputs,
//! driven through a scripted radio and a recording pair of pins.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use ble_shutter::ble::link::ConnectionState;
use ble_shutter::ble::{
    Advertisement, BdAddr, CharacteristicHandle, Peer, Radio, RadioEvent, Service, ServiceTable,
};
use ble_shutter::config::{
    ScanParams, BATTERY_LEVEL_CHAR_UUID, BATTERY_SERVICE_UUID, HID_REPORT_CHAR_UUID,
    HID_SERVICE_UUID, TARGET_ADDRESS, TARGET_NAME,
};
use ble_shutter::output::{Line, OutputActuator};
use ble_shutter::{Config, LinkError, Scheduler};
use embedded_hal::digital::{ErrorType, OutputPin};
use heapless::Deque;

const REPORT: CharacteristicHandle = CharacteristicHandle(0x0010);
const BATTERY: CharacteristicHandle = CharacteristicHandle(0x0020);

#[derive(Clone, Default)]
struct Pin(Rc<RefCell<Vec<bool>>>);

impl Pin {
    fn is_high(&self) -> bool {
        self.0.borrow().last().copied().unwrap_or(false)
    }
}

impl ErrorType for Pin {
    type Error = Infallible;
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedRadio {
    scans: usize,
    stops: usize,
    connects: Vec<Peer>,
    disconnects: usize,
    subscribes: Vec<CharacteristicHandle>,
    reads: Vec<CharacteristicHandle>,
}

impl Radio for ScriptedRadio {
    fn start_scan(&mut self, _params: &ScanParams) -> Result<(), LinkError> {
        self.scans += 1;
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.stops += 1;
    }

    fn connect(&mut self, peer: Peer) -> Result<(), LinkError> {
        self.connects.push(peer);
        Ok(())
    }

    fn cancel_connect(&mut self) {}

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }

    fn subscribe(&mut self, handle: CharacteristicHandle) -> Result<(), LinkError> {
        self.subscribes.push(handle);
        Ok(())
    }

    fn read(&mut self, handle: CharacteristicHandle) -> Result<(), LinkError> {
        self.reads.push(handle);
        Ok(())
    }
}

struct Rig {
    scheduler: Scheduler<Pin, Pin>,
    radio: ScriptedRadio,
    queue: Deque<RadioEvent, 16>,
    focus: Pin,
    shutter: Pin,
    now: u64,
}

impl Rig {
    fn new() -> Self {
        let focus = Pin::default();
        let shutter = Pin::default();
        let output = OutputActuator::new(focus.clone(), shutter.clone()).unwrap();
        Self {
            scheduler: Scheduler::new(Config::DEFAULT, output),
            radio: ScriptedRadio::default(),
            queue: Deque::new(),
            focus,
            shutter,
            now: 0,
        }
    }

    fn push(&mut self, event: RadioEvent) {
        self.queue.push_back(event).unwrap();
    }

    /// Tick every millisecond up to and including `until`.
    fn run_until(&mut self, until: u64) {
        while self.now <= until {
            self.scheduler
                .tick(self.now, &mut self.radio, &mut self.queue);
            self.now += 1;
        }
    }

    fn state(&self) -> ConnectionState {
        self.scheduler.link().state()
    }

    fn button(&mut self, pressed: bool) {
        let mut data = heapless::Vec::new();
        data.push(pressed as u8).unwrap();
        self.push(RadioEvent::Notification {
            handle: REPORT,
            data,
        });
    }
}

fn advert(name: &str, address: BdAddr) -> RadioEvent {
    RadioEvent::Advertisement(Advertisement {
        peer: Peer {
            address,
            random: false,
        },
        name: heapless::String::try_from(name).unwrap(),
        rssi: -60,
    })
}

fn full_table() -> ServiceTable {
    ServiceTable::new()
        .with_service(
            Service::new(HID_SERVICE_UUID).with_characteristic(HID_REPORT_CHAR_UUID, REPORT),
        )
        .with_service(
            Service::new(BATTERY_SERVICE_UUID).with_characteristic(BATTERY_LEVEL_CHAR_UUID, BATTERY),
        )
}

/// Scan, match, connect on the aligned tick, subscribe.  Ends at t = 1002.
fn connected_rig() -> Rig {
    let mut rig = Rig::new();
    rig.run_until(0);
    assert_eq!(rig.state(), ConnectionState::Scanning);
    assert_eq!(rig.radio.scans, 1);

    rig.push(advert(TARGET_NAME, TARGET_ADDRESS));
    rig.run_until(1);
    assert_eq!(rig.state(), ConnectionState::Found);
    assert_eq!(rig.radio.stops, 1);

    // Connect attempts only on every thousandth tick.
    rig.run_until(999);
    assert!(rig.radio.connects.is_empty());
    rig.run_until(1000);
    assert_eq!(rig.radio.connects.len(), 1);
    assert_eq!(rig.radio.connects[0].address, TARGET_ADDRESS);
    assert_eq!(rig.state(), ConnectionState::Connecting);

    rig.push(RadioEvent::Connected(full_table()));
    rig.run_until(1001);
    assert_eq!(rig.state(), ConnectionState::Subscribing);
    assert_eq!(rig.radio.subscribes, [REPORT]);

    rig.push(RadioEvent::Subscribed);
    rig.run_until(1002);
    assert_eq!(rig.state(), ConnectionState::Connected);
    assert!(rig.scheduler.link().is_ready());
    assert_eq!(rig.radio.reads, [BATTERY]);
    rig
}

#[test]
fn discovers_connects_and_subscribes() {
    let rig = connected_rig();
    assert!(!rig.focus.is_high());
    assert!(!rig.shutter.is_high());
}

#[test]
fn short_press_pulses_focus() {
    let mut rig = connected_rig();
    rig.run_until(1999);

    rig.button(true);
    rig.run_until(2000);
    rig.run_until(2019);
    rig.button(false);
    rig.run_until(2020);
    assert!(rig.focus.is_high());
    assert!(!rig.shutter.is_high());

    rig.run_until(2070);
    assert!(rig.focus.is_high());
    rig.run_until(2071);
    assert!(!rig.focus.is_high());
}

#[test]
fn medium_press_pulses_shutter() {
    let mut rig = connected_rig();
    rig.run_until(2999);

    rig.button(true);
    rig.run_until(3199);
    rig.button(false);
    rig.run_until(3200);
    assert!(rig.shutter.is_high());
    assert!(!rig.focus.is_high());

    rig.run_until(3250);
    assert!(rig.shutter.is_high());
    rig.run_until(3251);
    assert!(!rig.shutter.is_high());
}

#[test]
fn long_press_holds_shutter_until_release() {
    let mut rig = connected_rig();
    rig.run_until(3999);

    rig.button(true);
    rig.run_until(4350);
    assert!(!rig.shutter.is_high());
    rig.run_until(4351);
    assert!(rig.shutter.is_high());
    assert!(rig.scheduler.classifier().state().hold_active);

    rig.run_until(4999);
    rig.button(false);
    rig.run_until(5000);
    assert!(!rig.shutter.is_high());
    assert!(!rig.focus.is_high());
}

#[test]
fn release_one_past_hold_threshold_is_a_hold() {
    let mut rig = connected_rig();
    rig.run_until(1999);

    rig.button(true);
    rig.run_until(2350);
    assert!(!rig.shutter.is_high());

    // Release drains in the same tick the hold becomes due.
    rig.button(false);
    rig.run_until(2351);
    let state = *rig.scheduler.classifier().state();
    assert!(!state.hold_active);
    assert!(!state.shutter_active);
    assert!(!rig.shutter.is_high());
    assert_eq!(*rig.shutter.0.borrow(), [false, true, false]);

    // No shutter pulse follows.
    rig.run_until(2500);
    assert_eq!(*rig.shutter.0.borrow(), [false, true, false]);
    assert!(rig.focus.0.borrow().iter().all(|&high| !high));
}

#[test]
fn notifications_before_battery_result_are_classified() {
    let mut rig = connected_rig();
    assert_eq!(rig.radio.reads, [BATTERY]);

    // Press and release land while the battery read is still outstanding.
    rig.button(true);
    rig.run_until(1003);
    rig.run_until(1099);
    rig.button(false);
    rig.run_until(1100);
    assert!(rig.shutter.is_high());

    rig.push(RadioEvent::ValueRead {
        handle: BATTERY,
        value: Some(87),
    });
    rig.run_until(1151);
    assert!(!rig.shutter.is_high());
    assert!(rig.scheduler.link().is_ready());
}

#[test]
fn impostor_is_ignored_and_scan_continues() {
    let mut rig = Rig::new();
    rig.run_until(0);

    let wrong = BdAddr::new([0x2a, 0x07, 0x98, 0x00, 0x27, 0x03]);
    rig.push(advert(TARGET_NAME, wrong));
    rig.push(advert("Other", TARGET_ADDRESS));
    rig.run_until(2000);

    assert_eq!(rig.state(), ConnectionState::Scanning);
    assert_eq!(rig.radio.stops, 0);
    assert!(rig.radio.connects.is_empty());
    assert_eq!(
        rig.scheduler.link().last_error(),
        Some(LinkError::DiscoveryMismatch)
    );
}

#[test]
fn missed_scan_retries_after_backoff() {
    let mut rig = Rig::new();
    rig.run_until(0);
    rig.push(RadioEvent::ScanComplete);
    rig.run_until(5000);
    assert_eq!(rig.radio.scans, 1);
    rig.run_until(5001);
    assert_eq!(rig.radio.scans, 2);
    assert_eq!(rig.state(), ConnectionState::Scanning);
}

#[test]
fn disconnect_during_hold_releases_and_rescans() {
    let mut rig = connected_rig();
    rig.run_until(5999);

    rig.button(true);
    rig.run_until(6351);
    assert!(rig.shutter.is_high());

    rig.push(RadioEvent::Disconnected);
    rig.run_until(6400);
    assert!(!rig.shutter.is_high());
    assert!(!rig.scheduler.output().is_asserted(Line::Shutter));
    assert_eq!(rig.state(), ConnectionState::Scanning);
    assert_eq!(rig.radio.scans, 2);
    assert_eq!(
        rig.scheduler.link().last_error(),
        Some(LinkError::UnexpectedDisconnection)
    );

    // Reports on the old handle no longer reach the classifier.
    rig.button(true);
    rig.run_until(6401);
    assert!(!rig.scheduler.classifier().state().level);
}

#[test]
fn peripheral_without_hid_service_is_dropped() {
    let mut rig = Rig::new();
    rig.run_until(0);
    rig.push(advert(TARGET_NAME, TARGET_ADDRESS));
    rig.run_until(1000);
    assert_eq!(rig.state(), ConnectionState::Connecting);

    let table = ServiceTable::new().with_service(
        Service::new(BATTERY_SERVICE_UUID).with_characteristic(BATTERY_LEVEL_CHAR_UUID, BATTERY),
    );
    rig.push(RadioEvent::Connected(table));
    rig.run_until(1001);

    assert_eq!(rig.radio.disconnects, 1);
    assert!(rig.radio.subscribes.is_empty());
    assert_eq!(rig.state(), ConnectionState::Scanning);
    assert_eq!(rig.radio.scans, 2);
    assert_eq!(
        rig.scheduler.link().last_error(),
        Some(LinkError::ServiceNotFound)
    );
}
