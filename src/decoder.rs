//! Notification decoder - HID report bytes to timestamped button samples.
//!
//! The button sends one report per edge.  Which bytes mean "pressed" is
//! selectable because shutter remotes disagree: some send exactly `0x01`
//! / `0x00` in the first byte, others a keyboard-style report where any
//! non-zero byte is a key down.

/// Mapping from report bytes to button level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LevelEncoding {
    /// First byte `1` = pressed, `0` = released, anything else ignored.
    FirstByteIsOne,
    /// Any non-zero byte = pressed, all zero = released.
    AnyNonZero,
}

/// One observation of the button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonSample {
    pub pressed: bool,
    /// Monotonic time the notification was decoded (ms).
    pub timestamp_ms: u64,
}

pub struct NotificationDecoder {
    encoding: LevelEncoding,
}

impl NotificationDecoder {
    pub const fn new(encoding: LevelEncoding) -> Self {
        Self { encoding }
    }

    /// Decode one notification payload.  Empty or unrecognised payloads
    /// yield `None` and are treated as no sample at all.
    pub fn decode(&self, payload: &[u8], now_ms: u64) -> Option<ButtonSample> {
        debug!("Notification: {=[u8]:x}", payload);
        let pressed = match self.encoding {
            LevelEncoding::FirstByteIsOne => match payload.first()? {
                0 => false,
                1 => true,
                _ => return None,
            },
            LevelEncoding::AnyNonZero => {
                if payload.is_empty() {
                    return None;
                }
                payload.iter().any(|&b| b != 0)
            }
        };
        Some(ButtonSample {
            pressed,
            timestamp_ms: now_ms,
        })
    }
}
