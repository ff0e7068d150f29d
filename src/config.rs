//! Application-wide constants and compile-time configuration.
//!
//! All pin assignments, radio duty-cycle parameters, retry policy and
//! gesture timing thresholds live here so they can be tuned in one place.
//! [`Config::DEFAULT`] gathers them into the structs the state machines
//! are built from.

use crate::ble::BdAddr;
use crate::decoder::LevelEncoding;
use crate::gesture::{Boundary, ClassifierConfig};

// Target peripheral

/// Advertised local name of the wireless button (exact match).
pub const TARGET_NAME: &str = "BT1818";

/// Hardware address of the wireless button (exact match).
/// Displayed as `2a:07:98:00:27:02`.
pub const TARGET_ADDRESS: BdAddr = BdAddr::new([0x2a, 0x07, 0x98, 0x00, 0x27, 0x02]);

// BLE scanning

/// Scan interval (ms).
pub const BLE_SCAN_INTERVAL_MS: u16 = 100;

/// Scan window (ms). Slightly shorter than the interval so the radio
/// gets a gap between windows.
pub const BLE_SCAN_WINDOW_MS: u16 = 99;

/// How long a single scan runs before it is considered a miss (seconds).
pub const BLE_SCAN_DURATION_SECS: u16 = 5;

/// Fixed delay between the start of a failed scan and the next one (ms).
pub const BLE_RESCAN_BACKOFF_MS: u64 = 5000;

// BLE connection

/// Connect attempts only happen on ticks where `tick % divisor == 0`.
/// With the 1 ms tick this is one attempt per second.
pub const BLE_CONNECT_RETRY_DIVISOR: u32 = 1000;

/// A connect attempt with no result after this long is cancelled (ms).
pub const BLE_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for HID).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

// GATT identifiers

/// HID service.
pub const HID_SERVICE_UUID: u16 = 0x1812;
/// HID input report characteristic.
pub const HID_REPORT_CHAR_UUID: u16 = 0x2A4D;
/// Battery service.
pub const BATTERY_SERVICE_UUID: u16 = 0x180F;
/// Battery level characteristic.
pub const BATTERY_LEVEL_CHAR_UUID: u16 = 0x2A19;

// Gesture timing

/// Press longer than this starts a hold (ms).
pub const HOLD_THRESHOLD_MS: u64 = 350;

/// Press shorter than this is a focus tap (ms).
pub const FOCUS_THRESHOLD_MS: u64 = 50;

/// Minimum time an output stays asserted after the releasing edge (ms).
pub const RELEASE_SETTLE_MS: u64 = 50;

// Scheduler

/// Tick period of the scheduling loop (ms).
pub const TICK_PERIOD_MS: u64 = 1;

/// Depth of the inbound radio event queue.
pub const EVENT_QUEUE_DEPTH: usize = 16;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; the concrete `embassy_nrf::peripherals::*`
// pins are picked in `main.rs`.  Adjust for your custom PCB.
//
//   Focus line     → P0.04
//   Shutter line   → P0.05

/// Identity of the one peripheral we connect to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeripheralIdentity {
    pub name: &'static str,
    pub address: BdAddr,
}

impl PeripheralIdentity {
    /// Both the advertised name and the address must match.
    pub fn matches(&self, name: &str, address: &BdAddr) -> bool {
        self.name == name && self.address == *address
    }
}

/// Radio duty-cycle policy for one scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    pub interval_ms: u16,
    pub window_ms: u16,
    pub duration_secs: u16,
}

impl ScanParams {
    pub const fn duration_ms(&self) -> u64 {
        self.duration_secs as u64 * 1000
    }
}

/// Settings for the link lifecycle manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub identity: PeripheralIdentity,
    pub scan: ScanParams,
    pub rescan_backoff_ms: u64,
    pub connect_retry_divisor: u32,
    pub connect_timeout_ms: u64,
}

/// Everything the scheduler needs, in one place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub link: LinkConfig,
    pub classifier: ClassifierConfig,
}

impl Config {
    pub const DEFAULT: Config = Config {
        link: LinkConfig {
            identity: PeripheralIdentity {
                name: TARGET_NAME,
                address: TARGET_ADDRESS,
            },
            scan: ScanParams {
                interval_ms: BLE_SCAN_INTERVAL_MS,
                window_ms: BLE_SCAN_WINDOW_MS,
                duration_secs: BLE_SCAN_DURATION_SECS,
            },
            rescan_backoff_ms: BLE_RESCAN_BACKOFF_MS,
            connect_retry_divisor: BLE_CONNECT_RETRY_DIVISOR,
            connect_timeout_ms: BLE_CONNECT_TIMEOUT_MS,
        },
        classifier: ClassifierConfig {
            hold_threshold_ms: HOLD_THRESHOLD_MS,
            focus_threshold_ms: FOCUS_THRESHOLD_MS,
            release_settle_ms: RELEASE_SETTLE_MS,
            encoding: LevelEncoding::FirstByteIsOne,
            focus_boundary: Boundary::Exclusive,
            shutter_boundary: Boundary::Inclusive,
        },
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
