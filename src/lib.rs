//! BLE remote camera trigger.
//!
//! A wireless BLE button is translated into focus / shutter / hold pulses on
//! two output lines.  Everything in this library is plain state-machine
//! logic, `no_std`, and runs on the host for testing:
//!
//! - [`ble::link`] - scan → match → connect → subscribe, with rescan and
//!   reconnect policy;
//! - [`decoder`] - HID report bytes to timestamped button samples;
//! - [`gesture`] - press timing to focus / shutter / hold events;
//! - [`output`] - idempotent drive of the two lines;
//! - [`scheduler`] - the tick that owns and drives all of the above.
//!
//! Usage: `cargo test`
//!
//! Note: the embedded binary (`main.rs`, feature `embedded`) supplies the
//! SoftDevice radio and the nRF52840 pins and runs the tick loop.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod decoder;
pub mod error;
pub mod gesture;
pub mod output;
pub mod scheduler;

pub use config::Config;
pub use error::{Error, LinkError};
pub use scheduler::Scheduler;
