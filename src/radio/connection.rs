//! One connection session with the button.
//!
//! Connects with just-works security, discovers the GATT clients, then
//! serves subscribe/read requests while notifications stream into the
//! event queue.  Ends when the link drops or the link manager asks.

use core::cell::RefCell;

use ble_shutter::ble::{Peer, RadioEvent};
use ble_shutter::config;
use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use heapless::Vec;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    central, Address, AddressType, Connection, EncryptError, EncryptionInfo, IdentityKey,
    MasterId, SecurityMode,
};
use nrf_softdevice::raw;
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;

use super::{hid_client, post, RadioRequest, REQUESTS};

/// Bonds kept in RAM only; a reboot forgets the button.
const MAX_BONDS: usize = 2;

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

/// Accepts every pairing request without user interaction.
pub struct Bonder {
    peers: RefCell<Vec<PeerBond, MAX_BONDS>>,
}

impl Bonder {
    fn new() -> Self {
        Self {
            peers: RefCell::new(Vec::new()),
        }
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        let mut peers = self.peers.borrow_mut();
        if let Some(existing) = peers.iter_mut().find(|p| p.master_id == master_id) {
            existing.key = key;
            existing.peer_id = peer_id;
            return;
        }
        if peers.is_full() {
            peers.remove(0);
        }
        let _ = peers.push(PeerBond {
            master_id,
            key,
            peer_id,
        });
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.peers
            .borrow()
            .iter()
            .find_map(|p| (p.master_id == master_id).then_some(p.key))
    }

    fn get_peripheral_key(&self, conn: &Connection) -> Option<(MasterId, EncryptionInfo)> {
        self.peers.borrow().iter().find_map(|p| {
            p.peer_id
                .is_match(conn.peer_address())
                .then_some((p.master_id, p.key))
        })
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
    }
}

/// Take the bond table.  Call once.
pub fn bonder() -> &'static Bonder {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    BONDER.init(Bonder::new())
}

async fn wait_for_secure_link(conn: &Connection) -> bool {
    for _ in 0..25 {
        match conn.security_mode() {
            SecurityMode::NoAccess | SecurityMode::Open => {
                Timer::after(Duration::from_millis(200)).await
            }
            _ => return true,
        }
    }
    false
}

async fn connect(
    sd: &'static Softdevice,
    bonder: &'static Bonder,
    peer: Peer,
) -> Option<Connection> {
    let kind = if peer.random {
        AddressType::RandomStatic
    } else {
        AddressType::Public
    };
    let address = Address::new(kind, peer.address.to_le_bytes());
    info!("Connecting to {}", peer.address);

    let whitelist = [&address];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let conn = central::connect_with_security(sd, &conn_cfg, bonder)
        .await
        .ok()?;

    let secure = match conn.encrypt() {
        Ok(()) => wait_for_secure_link(&conn).await,
        Err(EncryptError::PeerKeysNotFound) => {
            conn.request_pairing().is_ok() && wait_for_secure_link(&conn).await
        }
        Err(_) => false,
    };

    if !secure {
        warn!("failed to secure BLE link");
        let _ = conn.disconnect();
        return None;
    }
    Some(conn)
}

/// Run one session with `peer`.
///
/// Returns a request that arrived while connecting and could not be served
/// here, so the radio task can run it next.
pub async fn session(
    sd: &'static Softdevice,
    bonder: &'static Bonder,
    peer: Peer,
) -> Option<RadioRequest> {
    let conn = match select(connect(sd, bonder, peer), REQUESTS.receive()).await {
        Either::First(Some(conn)) => conn,
        Either::First(None) => {
            post(RadioEvent::ConnectFailed);
            return None;
        }
        Either::Second(RadioRequest::CancelConnect | RadioRequest::Disconnect) => {
            info!("connect attempt cancelled");
            return None;
        }
        Either::Second(other) => return Some(other),
    };

    let (clients, table) = hid_client::discover(&conn).await;
    post(RadioEvent::Connected(table));

    // One listener for the whole session; requests are served beside it.
    let listen = hid_client::run_notification_loop(&conn, &clients);
    let serve = serve_requests(&conn, &clients);
    match select(listen, serve).await {
        Either::First(()) => {
            post(RadioEvent::Disconnected);
            None
        }
        Either::Second(next) => next,
    }
}

/// Serve link manager requests until one ends the session.
async fn serve_requests(
    conn: &Connection,
    clients: &hid_client::Clients,
) -> Option<RadioRequest> {
    loop {
        match REQUESTS.receive().await {
            RadioRequest::Subscribe(handle) => {
                if hid_client::subscribe(clients, handle).await {
                    post(RadioEvent::Subscribed);
                } else {
                    post(RadioEvent::SubscribeFailed);
                }
            }
            RadioRequest::Read(handle) => {
                let value = hid_client::read(clients, handle).await;
                post(RadioEvent::ValueRead { handle, value });
            }
            RadioRequest::Disconnect | RadioRequest::CancelConnect => {
                let _ = conn.disconnect();
                return None;
            }
            RadioRequest::StartScan(params) => {
                let _ = conn.disconnect();
                return Some(RadioRequest::StartScan(params));
            }
            RadioRequest::StopScan | RadioRequest::Connect(_) => {}
        }
    }
}
