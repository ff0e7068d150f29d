//! BLE GAP scanner - reports named advertisers to the link manager.
//!
//! Uses the SoftDevice Central-role scanning API with the duty cycle from
//! [`ScanParams`].  Matching against the target identity is not done here;
//! every named report becomes a [`RadioEvent::Advertisement`].

use ble_shutter::ble::adv_parser::extract_device_name;
use ble_shutter::ble::{Advertisement, BdAddr, Peer, RadioEvent};
use ble_shutter::config::ScanParams;
use defmt::{info, warn};
use nrf_softdevice::ble::{central, Address, AddressType};
use nrf_softdevice::Softdevice;

use super::post;

/// Milliseconds to SoftDevice scan units (0.625 ms).
const fn scan_units(ms: u16) -> u32 {
    ms as u32 * 8 / 5
}

/// Run one scan for `params.duration_secs`.
///
/// Returns when the scan times out (posting `ScanComplete`) or fails.
pub async fn scan(sd: &Softdevice, params: &ScanParams) {
    info!(
        "BLE scan starting ({} s window, {}/{} ms)",
        params.duration_secs, params.window_ms, params.interval_ms
    );

    let config = central::ScanConfig {
        // Active scan to retrieve scan-response data (device names).
        active: true,
        interval: scan_units(params.interval_ms),
        window: scan_units(params.window_ms),
        // 10 ms units.
        timeout: params.duration_secs.saturating_mul(100),
        ..Default::default()
    };

    let result = central::scan(sd, &config, |report| {
        let data =
            unsafe { core::slice::from_raw_parts(report.data.p_data, report.data.len as usize) };

        // Nameless reports can never match; the scan response will follow.
        let Some(name) = extract_device_name(data) else {
            return None;
        };

        let address = Address::from_raw(report.peer_addr);
        let peer = Peer {
            address: BdAddr::from_le_bytes(address.bytes()),
            random: !matches!(address.address_type(), AddressType::Public),
        };
        post(RadioEvent::Advertisement(Advertisement {
            peer,
            name,
            rssi: report.rssi,
        }));

        // Keep scanning; the link manager decides when to stop.
        None::<()>
    })
    .await;

    if result.is_err() {
        // Timeout is the normal end of a scan window.
        if !matches!(result, Err(central::ScanError::Timeout)) {
            warn!("BLE scan ended with error");
        }
        post(RadioEvent::ScanComplete);
    }
}
