//! Link lifecycle manager - scan → match → connect → subscribe → monitor.
//!
//! Owns the single [`ConnectionState`] and the rescan [`RetryTimer`].  It
//! is driven from two places, both inside the scheduler tick:
//!
//! - [`LinkManager::handle_event`] for every queued [`RadioEvent`];
//! - [`LinkManager::poll`] once per tick for the time-based transitions
//!   (scan timeout, rescan backoff, coarse connect retry, connect and
//!   subscribe timeouts).
//!
//! Every failure is recoverable: the worst case is a fresh scan.

use crate::ble::{CharacteristicHandle, Peer, Radio, RadioEvent, ServiceTable};
use crate::config::{
    LinkConfig, BATTERY_LEVEL_CHAR_UUID, BATTERY_SERVICE_UUID, HID_REPORT_CHAR_UUID,
    HID_SERVICE_UUID,
};
use crate::error::LinkError;

/// Connection state, one instance per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Nothing started yet.
    Idle,
    /// A scan is running, or stopped and waiting for the rescan backoff.
    Scanning,
    /// The target was found; waiting for the next connect window.
    Found,
    /// A connect request is outstanding.
    Connecting,
    /// Link is up; enabling notifications on the HID report.
    Subscribing,
    /// Notifications are flowing - the device is ready.
    Connected,
    /// The link was lost; the next tick rescans from a clean state.
    Disconnected,
}

/// Rescan backoff bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryTimer {
    /// Start of the most recent scan attempt (ms).
    pub last_attempt_ms: u64,
    /// Set once per scan cycle when the scan ended without a match.
    pub pending: bool,
}

/// Edges of the "device ready" signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkSignal {
    Ready,
    Lost,
}

pub struct LinkManager {
    config: LinkConfig,
    state: ConnectionState,
    retry: RetryTimer,
    peer: Option<Peer>,
    report: Option<CharacteristicHandle>,
    battery: Option<CharacteristicHandle>,
    /// Start of the current connect or subscribe step (ms).
    phase_started_ms: u64,
    ready: bool,
    last_error: Option<LinkError>,
}

impl LinkManager {
    pub const fn new(config: LinkConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Idle,
            retry: RetryTimer {
                last_attempt_ms: 0,
                pending: false,
            },
            peer: None,
            report: None,
            battery: None,
            phase_started_ms: 0,
            ready: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// "Device ready": notifications from the report characteristic are
    /// subscribed and may be decoded.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn retry(&self) -> RetryTimer {
        self.retry
    }

    pub fn peer(&self) -> Option<Peer> {
        self.peer
    }

    pub fn report_handle(&self) -> Option<CharacteristicHandle> {
        self.report
    }

    /// Most recent recoverable failure, for diagnostics.
    pub fn last_error(&self) -> Option<LinkError> {
        self.last_error
    }

    /// True if a notification on `handle` should reach the decoder.
    pub fn accepts_notification(&self, handle: CharacteristicHandle) -> bool {
        self.ready && self.report == Some(handle)
    }

    /// Apply one radio event.  Returns the ready/lost edge, if any.
    pub fn handle_event<R: Radio>(
        &mut self,
        event: &RadioEvent,
        now_ms: u64,
        radio: &mut R,
    ) -> Option<LinkSignal> {
        match event {
            RadioEvent::Advertisement(adv) => {
                if self.state == ConnectionState::Scanning {
                    self.on_advertisement(adv.peer, adv.name.as_str(), radio);
                }
                None
            }
            RadioEvent::ScanComplete => {
                if self.state == ConnectionState::Scanning {
                    self.scan_missed(radio, false);
                }
                None
            }
            RadioEvent::Connected(table) => {
                if self.state == ConnectionState::Connecting {
                    self.on_connected(table, now_ms, radio);
                } else {
                    // Late completion of an attempt we already gave up on.
                    warn!("unexpected connection in state {}, dropping it", self.state);
                    radio.disconnect();
                }
                None
            }
            RadioEvent::ConnectFailed => {
                if self.state == ConnectionState::Connecting {
                    warn!("Connection failed!");
                    self.last_error = Some(LinkError::ConnectionFailed);
                    self.state = ConnectionState::Found;
                }
                None
            }
            RadioEvent::Subscribed => {
                if self.state != ConnectionState::Subscribing {
                    return None;
                }
                self.state = ConnectionState::Connected;
                self.ready = true;
                self.last_error = None;
                info!("Connection established. Press any key...");
                if let Some(battery) = self.battery {
                    // Best effort; a refusal changes nothing.
                    let _ = radio.read(battery);
                }
                Some(LinkSignal::Ready)
            }
            RadioEvent::SubscribeFailed => {
                if self.state == ConnectionState::Subscribing {
                    self.fail_session(LinkError::SubscriptionFailed, radio);
                }
                None
            }
            RadioEvent::ValueRead { handle, value } => {
                if self.battery == Some(*handle) {
                    if let Some(level) = value {
                        info!("Battery: {}%", level);
                    }
                }
                None
            }
            RadioEvent::Notification { .. } => None,
            RadioEvent::Disconnected => self.on_disconnected(),
        }
    }

    /// Time-based transitions.  `tick` is the scheduler's tick counter,
    /// used to align connect attempts to a coarse period.
    pub fn poll<R: Radio>(&mut self, now_ms: u64, tick: u32, radio: &mut R) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Disconnected => self.start_scan(now_ms, radio),
            ConnectionState::Scanning => {
                let elapsed = now_ms.saturating_sub(self.retry.last_attempt_ms);
                if self.retry.pending {
                    if elapsed > self.config.rescan_backoff_ms {
                        info!("Retrying BLE scan...");
                        self.start_scan(now_ms, radio);
                    }
                } else if elapsed >= self.config.scan.duration_ms() {
                    self.scan_missed(radio, true);
                }
            }
            ConnectionState::Found => {
                if tick % self.config.connect_retry_divisor.max(1) == 0 {
                    self.connect(now_ms, radio);
                }
            }
            ConnectionState::Connecting => {
                let elapsed = now_ms.saturating_sub(self.phase_started_ms);
                if elapsed >= self.config.connect_timeout_ms {
                    warn!("connect attempt timed out after {} ms", elapsed);
                    radio.cancel_connect();
                    self.last_error = Some(LinkError::ConnectionFailed);
                    self.state = ConnectionState::Found;
                }
            }
            ConnectionState::Subscribing => {
                let elapsed = now_ms.saturating_sub(self.phase_started_ms);
                if elapsed >= self.config.connect_timeout_ms {
                    warn!("no subscription result after {} ms", elapsed);
                    self.fail_session(LinkError::SubscriptionFailed, radio);
                }
            }
            ConnectionState::Connected => {}
        }
    }

    fn start_scan<R: Radio>(&mut self, now_ms: u64, radio: &mut R) {
        self.retry = RetryTimer {
            last_attempt_ms: now_ms,
            pending: false,
        };
        self.peer = None;
        self.state = ConnectionState::Scanning;

        match radio.start_scan(&self.config.scan) {
            Ok(()) => info!(
                "Scanning for {} ({}) for {} s",
                self.config.identity.name,
                self.config.identity.address,
                self.config.scan.duration_secs
            ),
            Err(e) => {
                warn!("could not start scan: {}", e);
                self.last_error = Some(e);
                self.retry.pending = true;
            }
        }
    }

    /// Scan ended without a match.  Arms the retry at most once per cycle.
    fn scan_missed<R: Radio>(&mut self, radio: &mut R, stop: bool) {
        if self.retry.pending {
            return;
        }
        info!("{} not found, will retry...", self.config.identity.name);
        self.retry.pending = true;
        self.last_error = Some(LinkError::DiscoveryMismatch);
        if stop {
            radio.stop_scan();
        }
    }

    fn on_advertisement<R: Radio>(&mut self, peer: Peer, name: &str, radio: &mut R) {
        let identity = self.config.identity;
        if identity.matches(name, &peer.address) {
            info!("{} found, connecting...", identity.name);
            radio.stop_scan();
            self.peer = Some(peer);
            self.retry.pending = false;
            self.state = ConnectionState::Found;
        } else if name == identity.name {
            warn!(
                "ignoring {} at {}: address does not match {}",
                name,
                peer.address,
                identity.address
            );
            self.last_error = Some(LinkError::DiscoveryMismatch);
        } else if peer.address == identity.address {
            warn!("ignoring {}: advertised name {} does not match", peer.address, name);
            self.last_error = Some(LinkError::DiscoveryMismatch);
        } else {
            debug!("skipping advertiser {}", peer.address);
        }
    }

    fn connect<R: Radio>(&mut self, now_ms: u64, radio: &mut R) {
        let Some(peer) = self.peer else {
            self.state = ConnectionState::Disconnected;
            return;
        };
        info!("Establishing connection to {}...", peer.address);
        match radio.connect(peer) {
            Ok(()) => {
                self.state = ConnectionState::Connecting;
                self.phase_started_ms = now_ms;
            }
            Err(e) => {
                warn!("connect request refused: {}", e);
                self.last_error = Some(LinkError::ConnectionFailed);
            }
        }
    }

    fn on_connected<R: Radio>(&mut self, table: &ServiceTable, now_ms: u64, radio: &mut R) {
        self.state = ConnectionState::Subscribing;
        self.phase_started_ms = now_ms;
        info!("Connected. Searching HID service...");

        let Some(hid) = table.find_service(HID_SERVICE_UUID) else {
            return self.fail_session(LinkError::ServiceNotFound, radio);
        };
        let Some(report) = hid.find_characteristic(HID_REPORT_CHAR_UUID) else {
            return self.fail_session(LinkError::CharacteristicNotFound, radio);
        };
        self.report = Some(report);
        self.battery = table.find(BATTERY_SERVICE_UUID, BATTERY_LEVEL_CHAR_UUID);

        if radio.subscribe(report).is_err() {
            self.fail_session(LinkError::SubscriptionFailed, radio);
        }
    }

    /// Tear down a link that cannot be used this session.
    fn fail_session<R: Radio>(&mut self, error: LinkError, radio: &mut R) {
        warn!("{}, dropping link", error);
        radio.disconnect();
        self.clear_link();
        self.last_error = Some(error);
    }

    fn on_disconnected(&mut self) -> Option<LinkSignal> {
        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Subscribing
            | ConnectionState::Connected => {
                warn!("Disconnected");
                let was_ready = self.ready;
                self.clear_link();
                self.last_error = Some(LinkError::UnexpectedDisconnection);
                was_ready.then_some(LinkSignal::Lost)
            }
            _ => {
                debug!("disconnect in state {} ignored", self.state);
                None
            }
        }
    }

    fn clear_link(&mut self) {
        self.ready = false;
        self.report = None;
        self.battery = None;
        self.peer = None;
        self.retry = RetryTimer::default();
        self.state = ConnectionState::Disconnected;
    }
}
