//! 48-bit Bluetooth device address.

use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// Bluetooth device address, most significant byte first
/// (the order it is written in: `2a:07:98:00:27:02`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from the little-endian byte order used on the air and by the
    /// SoftDevice.
    pub const fn from_le_bytes(le: [u8; 6]) -> Self {
        Self([le[5], le[4], le[3], le[2], le[1], le[0]])
    }

    pub const fn to_le_bytes(&self) -> [u8; 6] {
        let b = self.0;
        [b[5], b[4], b[3], b[2], b[1], b[0]]
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddr {
    fn format(&self, f: defmt::Formatter) {
        let b = self.0;
        defmt::write!(
            f,
            "{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}",
            b[0],
            b[1],
            b[2],
            b[3],
            b[4],
            b[5]
        )
    }
}

impl FromStr for BdAddr {
    type Err = Error;

    /// Parses `aa:bb:cc:dd:ee:ff`; hex digits may be either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or(Error::InvalidAddress)?;
            if part.len() != 2 || !part.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidAddress);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| Error::InvalidAddress)?;
        }
        if parts.next().is_some() {
            return Err(Error::InvalidAddress);
        }
        Ok(Self(bytes))
    }
}
