//! GATT clients for the button: HID report (notify) and battery level (read).
//!
//! Discovery results are flattened into a [`ServiceTable`] so the link
//! manager, not this module, decides what a usable peripheral is.

use ble_shutter::ble::{CharacteristicHandle, RadioEvent, Service, ServiceTable};
use ble_shutter::config::{
    BATTERY_LEVEL_CHAR_UUID, BATTERY_SERVICE_UUID, HID_REPORT_CHAR_UUID, HID_SERVICE_UUID,
};
use defmt::{info, warn};
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, DiscoverError};
use nrf_softdevice::ble::Connection;

use super::post;

#[nrf_softdevice::gatt_client(uuid = "1812")]
pub struct HidServiceClient {
    /// HID Report (Input) - one notification per button edge.
    #[characteristic(uuid = "2a4d", read, notify)]
    pub hid_report: Vec<u8, 20>,
}

#[nrf_softdevice::gatt_client(uuid = "180f")]
pub struct BatteryServiceClient {
    #[characteristic(uuid = "2a19", read)]
    pub battery_level: u8,
}

/// Clients found on the connected peripheral.
pub struct Clients {
    pub hid: Option<HidServiceClient>,
    pub battery: Option<BatteryServiceClient>,
}

impl Clients {
    fn report_handle(&self) -> Option<CharacteristicHandle> {
        self.hid
            .as_ref()
            .map(|c| CharacteristicHandle(c.hid_report_value_handle))
    }

    fn battery_handle(&self) -> Option<CharacteristicHandle> {
        self.battery
            .as_ref()
            .map(|c| CharacteristicHandle(c.battery_level_value_handle))
    }
}

/// Discover both services and describe what was found.
pub async fn discover(conn: &Connection) -> (Clients, ServiceTable) {
    info!("Discovering HID service...");
    let mut table = ServiceTable::new();

    let hid = match gatt_client::discover::<HidServiceClient>(conn).await {
        Ok(client) => {
            table = table.with_service(Service::new(HID_SERVICE_UUID).with_characteristic(
                HID_REPORT_CHAR_UUID,
                CharacteristicHandle(client.hid_report_value_handle),
            ));
            Some(client)
        }
        Err(DiscoverError::ServiceIncomplete) => {
            table = table.with_service(Service::new(HID_SERVICE_UUID));
            None
        }
        Err(_) => None,
    };

    let battery = match gatt_client::discover::<BatteryServiceClient>(conn).await {
        Ok(client) => {
            table = table.with_service(Service::new(BATTERY_SERVICE_UUID).with_characteristic(
                BATTERY_LEVEL_CHAR_UUID,
                CharacteristicHandle(client.battery_level_value_handle),
            ));
            Some(client)
        }
        Err(_) => None,
    };

    (Clients { hid, battery }, table)
}

/// Enable notifications on `handle`.
pub async fn subscribe(clients: &Clients, handle: CharacteristicHandle) -> bool {
    let Some(hid) = clients.hid.as_ref() else {
        return false;
    };
    if clients.report_handle() != Some(handle) {
        warn!("subscribe on unknown handle {}", handle);
        return false;
    }
    match hid.hid_report_cccd_write(true).await {
        Ok(()) => {
            info!("Subscribed to HID report notifications");
            true
        }
        Err(_) => false,
    }
}

/// Read one byte from `handle`; only the battery level is readable.
pub async fn read(clients: &Clients, handle: CharacteristicHandle) -> Option<u8> {
    let battery = clients.battery.as_ref()?;
    if clients.battery_handle() != Some(handle) {
        return None;
    }
    battery.battery_level_read().await.ok()
}

/// Forward notifications until the connection closes.
pub async fn run_notification_loop(conn: &Connection, clients: &Clients) {
    let Some(hid) = clients.hid.as_ref() else {
        // Nothing to listen to; the session loop ends this via Disconnect.
        return core::future::pending().await;
    };
    let handle = CharacteristicHandle(hid.hid_report_value_handle);

    let _ = gatt_client::run(conn, hid, |event| match event {
        HidServiceClientEvent::HidReportNotification(data) => {
            post(RadioEvent::Notification { handle, data });
        }
    })
    .await;

    info!("HID notification loop ended (connection closed)");
}
