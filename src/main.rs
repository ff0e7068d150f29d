//! BLE remote camera trigger - nRF52840 firmware entry point.
//!
//! Wires the SoftDevice radio task, the two GPIO output lines and the
//! 1 ms scheduler tick together.  All behaviour lives in the library.

#![no_std]
#![no_main]

mod radio;

use ble_shutter::config::{Config, TICK_PERIOD_MS};
use ble_shutter::output::OutputActuator;
use ble_shutter::Scheduler;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::Priority;
use embassy_time::{Duration, Instant, Ticker};
use nrf_softdevice::{raw, Softdevice};
use {defmt_rtt as _, panic_probe as _};

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("BLE shutter remote starting");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut hal_config = embassy_nrf::config::Config::default();
    hal_config.gpiote_interrupt_priority = Priority::P2;
    hal_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(hal_config);

    // Focus on P0.04, shutter on P0.05, both released at boot.
    let focus = Output::new(p.P0_04, Level::Low, OutputDrive::Standard);
    let shutter = Output::new(p.P0_05, Level::Low, OutputDrive::Standard);
    let output = unwrap!(OutputActuator::new(focus, shutter));

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 64 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 1,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };
    let sd = Softdevice::enable(&sd_config);
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(radio::radio_task(sd)));

    let mut scheduler = Scheduler::new(Config::DEFAULT, output);
    let mut radio = radio::ChannelRadio;
    let mut events = radio::EventQueue;
    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));

    let target = Config::DEFAULT.link.identity;
    info!("Target: {} @ {}", target.name, target.address);

    loop {
        ticker.next().await;
        scheduler.tick(Instant::now().as_millis(), &mut radio, &mut events);
    }
}
