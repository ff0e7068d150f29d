//! SoftDevice-backed BLE capability.
//!
//! The tick loop talks to the radio through two channels only:
//!
//! - [`REQUESTS`] - filled by [`ChannelRadio`] (the [`Radio`] impl), never
//!   blocks the tick; a full queue is reported as `RadioUnavailable`.
//! - [`EVENTS`] - filled by the radio task and SoftDevice callbacks with
//!   `try_send`, drained once per tick through [`EventQueue`].
//!
//! The radio task runs one request at a time: a scan, or one connection
//! session (connect → discover → serve subscribe/read → notifications)
//! until the link drops.

mod connection;
mod hid_client;
mod scanner;

use ble_shutter::ble::{CharacteristicHandle, EventSource, Peer, Radio, RadioEvent};
use ble_shutter::config::{ScanParams, EVENT_QUEUE_DEPTH};
use ble_shutter::LinkError;
use defmt::{warn, Format};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::Softdevice;

/// Requests from the link manager to the radio task.
#[derive(Clone, Copy, Format)]
pub enum RadioRequest {
    StartScan(ScanParams),
    StopScan,
    Connect(Peer),
    CancelConnect,
    Disconnect,
    Subscribe(CharacteristicHandle),
    Read(CharacteristicHandle),
}

pub static REQUESTS: Channel<CriticalSectionRawMutex, RadioRequest, 4> = Channel::new();
pub static EVENTS: Channel<CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE_DEPTH> =
    Channel::new();

/// Queue an event for the next tick.  Never blocks; drops if full.
pub(crate) fn post(event: RadioEvent) {
    if EVENTS.try_send(event).is_err() {
        warn!("radio event queue full - dropping event");
    }
}

/// [`Radio`] implementation handed to the scheduler.
pub struct ChannelRadio;

impl ChannelRadio {
    fn request(&mut self, request: RadioRequest) -> Result<(), LinkError> {
        REQUESTS
            .try_send(request)
            .map_err(|_| LinkError::RadioUnavailable)
    }
}

impl Radio for ChannelRadio {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), LinkError> {
        self.request(RadioRequest::StartScan(*params))
    }

    fn stop_scan(&mut self) {
        let _ = self.request(RadioRequest::StopScan);
    }

    fn connect(&mut self, peer: Peer) -> Result<(), LinkError> {
        self.request(RadioRequest::Connect(peer))
    }

    fn cancel_connect(&mut self) {
        let _ = self.request(RadioRequest::CancelConnect);
    }

    fn disconnect(&mut self) {
        let _ = self.request(RadioRequest::Disconnect);
    }

    fn subscribe(&mut self, handle: CharacteristicHandle) -> Result<(), LinkError> {
        self.request(RadioRequest::Subscribe(handle))
    }

    fn read(&mut self, handle: CharacteristicHandle) -> Result<(), LinkError> {
        self.request(RadioRequest::Read(handle))
    }
}

/// [`EventSource`] over [`EVENTS`].
pub struct EventQueue;

impl EventSource for EventQueue {
    fn next_event(&mut self) -> Option<RadioEvent> {
        EVENTS.try_receive().ok()
    }
}

#[embassy_executor::task]
pub async fn radio_task(sd: &'static Softdevice) -> ! {
    let bonder = connection::bonder();
    let mut pending: Option<RadioRequest> = None;

    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => REQUESTS.receive().await,
        };

        match request {
            RadioRequest::StartScan(params) => {
                match select(scanner::scan(sd, &params), REQUESTS.receive()).await {
                    Either::First(()) => {}
                    Either::Second(RadioRequest::StopScan) => post(RadioEvent::ScanComplete),
                    // Anything else preempts the scan.
                    Either::Second(next) => pending = Some(next),
                }
            }
            RadioRequest::Connect(peer) => {
                pending = connection::session(sd, bonder, peer).await;
            }
            RadioRequest::Subscribe(_) => post(RadioEvent::SubscribeFailed),
            RadioRequest::Read(handle) => post(RadioEvent::ValueRead {
                handle,
                value: None,
            }),
            // Nothing running to stop.
            RadioRequest::StopScan | RadioRequest::CancelConnect | RadioRequest::Disconnect => {}
        }
    }
}
