//! Bluetooth Low Energy link to the wireless button.
//!
//! The radio itself (SoftDevice S140 on target) is consumed through two
//! seams:
//!
//! 1. **[`Radio`]** - non-blocking requests (scan, connect, subscribe, read).
//!    A request either is refused immediately or completes later.
//! 2. **[`RadioEvent`]** - every completion and every unsolicited event
//!    (advertisements, notifications, disconnects) arrives as one of a
//!    closed set of variants, queued and drained once per tick through an
//!    [`EventSource`].
//!
//! [`link::LinkManager`] owns the connection state machine on top of them.

pub mod address;
pub mod adv_parser;
pub mod link;

pub use address::BdAddr;

use heapless::{String, Vec};

use crate::config::ScanParams;
use crate::error::LinkError;

/// Largest notification payload we keep (bytes).
pub const MAX_NOTIFICATION_LEN: usize = 20;

/// Services / characteristics tracked per discovery result.
pub const MAX_SERVICES: usize = 4;
pub const MAX_CHARACTERISTICS: usize = 4;

/// Attribute handle of a remote characteristic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandle(pub u16);

/// Discovered peripheral retained between `Found` and `Connecting`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Peer {
    pub address: BdAddr,
    /// Random (static) rather than public address.
    pub random: bool,
}

/// One advertising report seen while scanning.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Advertisement {
    pub peer: Peer,
    /// Local name (truncated to 32 bytes), empty if none was advertised.
    pub name: String<32>,
    pub rssi: i8,
}

/// A remote GATT service with the characteristics we looked for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Service {
    pub uuid: u16,
    pub characteristics: Vec<(u16, CharacteristicHandle), MAX_CHARACTERISTICS>,
}

impl Service {
    pub fn new(uuid: u16) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    /// Builder-style helper; characteristics past capacity are dropped.
    pub fn with_characteristic(mut self, uuid: u16, handle: CharacteristicHandle) -> Self {
        let _ = self.characteristics.push((uuid, handle));
        self
    }

    pub fn find_characteristic(&self, uuid: u16) -> Option<CharacteristicHandle> {
        self.characteristics
            .iter()
            .find_map(|&(u, handle)| (u == uuid).then_some(handle))
    }
}

/// GATT discovery result delivered with [`RadioEvent::Connected`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceTable {
    pub services: Vec<Service, MAX_SERVICES>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: Service) -> Self {
        let _ = self.services.push(service);
        self
    }

    pub fn find_service(&self, uuid: u16) -> Option<&Service> {
        self.services.iter().find(|s| s.uuid == uuid)
    }

    /// Convenience lookup of `service` → `characteristic`.
    pub fn find(&self, service: u16, characteristic: u16) -> Option<CharacteristicHandle> {
        self.find_service(service)?
            .find_characteristic(characteristic)
    }
}

/// Everything the radio reports back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RadioEvent {
    /// An advertiser was seen during a scan.
    Advertisement(Advertisement),
    /// The scan duration elapsed (or the scan was stopped).
    ScanComplete,
    /// The link-layer connection is up and GATT discovery has finished.
    Connected(ServiceTable),
    /// The connection attempt failed.
    ConnectFailed,
    /// Notifications were enabled on the requested characteristic.
    Subscribed,
    /// Enabling notifications failed.
    SubscribeFailed,
    /// Result of a best-effort single-byte read; `None` if it failed.
    ValueRead {
        handle: CharacteristicHandle,
        value: Option<u8>,
    },
    /// Notification payload pushed by the peripheral.
    Notification {
        handle: CharacteristicHandle,
        data: Vec<u8, MAX_NOTIFICATION_LEN>,
    },
    /// The link dropped.
    Disconnected,
}

/// The BLE capability, as seen by the link manager.
///
/// No method may block: each one only queues a request.  Results come
/// back later as [`RadioEvent`]s.
pub trait Radio {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), LinkError>;

    fn stop_scan(&mut self);

    fn connect(&mut self, peer: Peer) -> Result<(), LinkError>;

    /// Abandon an outstanding connect attempt.
    fn cancel_connect(&mut self);

    fn disconnect(&mut self);

    /// Enable notifications on `handle`.
    fn subscribe(&mut self, handle: CharacteristicHandle) -> Result<(), LinkError>;

    /// Best-effort read of a single byte from `handle`.
    fn read(&mut self, handle: CharacteristicHandle) -> Result<(), LinkError>;
}

/// Inbound event queue, drained once per tick.
pub trait EventSource {
    fn next_event(&mut self) -> Option<RadioEvent>;
}

impl<const N: usize> EventSource for heapless::spsc::Consumer<'_, RadioEvent, N> {
    fn next_event(&mut self) -> Option<RadioEvent> {
        self.dequeue()
    }
}

impl<const N: usize> EventSource for heapless::Deque<RadioEvent, N> {
    fn next_event(&mut self) -> Option<RadioEvent> {
        self.pop_front()
    }
}
