//! Unified error type for ble-shutter.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use core::fmt;

use crate::output::Line;

/// Top-level error type used across the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Writing an output line failed.
    Output(Line),

    /// A hardware address string was not six colon-separated hex bytes.
    InvalidAddress,
}

/// Failures of the BLE link, all recoverable by the link manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// The radio refused a request (not initialised, busy, queue full).
    RadioUnavailable,
    /// An advertiser carried the target name but not the target address,
    /// or the scan ended without finding the peripheral.
    DiscoveryMismatch,
    /// The link-layer connection attempt failed or timed out.
    ConnectionFailed,
    /// The HID service (0x1812) is missing.
    ServiceNotFound,
    /// The HID input report characteristic (0x2A4D) is missing.
    CharacteristicNotFound,
    /// Enabling notifications on the report characteristic failed.
    SubscriptionFailed,
    /// The link dropped after it was established.
    UnexpectedDisconnection,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LinkError::RadioUnavailable => "radio unavailable",
            LinkError::DiscoveryMismatch => "peripheral not found or impostor",
            LinkError::ConnectionFailed => "connection failed",
            LinkError::ServiceNotFound => "HID service not found",
            LinkError::CharacteristicNotFound => "HID report characteristic not found",
            LinkError::SubscriptionFailed => "subscription failed",
            LinkError::UnexpectedDisconnection => "unexpected disconnection",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Output(line) => write!(f, "failed to drive {} line", line.as_str()),
            Error::InvalidAddress => f.write_str("invalid hardware address"),
        }
    }
}
