//! Advertising-data helpers used by the scanner.

use heapless::String;

/// AD type: Shortened Local Name.
const AD_SHORT_NAME: u8 = 0x08;
/// AD type: Complete Local Name.
const AD_COMPLETE_NAME: u8 = 0x09;

/// Extract the complete/shortened local name from advertisement or
/// scan-response data.
///
/// Returns `None` when no name is advertised.  Names longer than 32 bytes
/// are truncated; non-ASCII bytes are dropped.
pub fn extract_device_name(data: &[u8]) -> Option<String<32>> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == AD_SHORT_NAME || ad_type == AD_COMPLETE_NAME {
            let name_bytes = &data[i + 2..i + 1 + len];
            let mut name = String::new();
            for &b in name_bytes.iter().filter(|b| b.is_ascii()) {
                if name.push(b as char).is_err() {
                    break;
                }
            }
            return Some(name);
        }
        i += len + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_complete_local_name() {
        let ad_data = [
            0x02, 0x01, 0x06, // Flags
            0x07, 0x09, b'B', b'T', b'1', b'8', b'1', b'8',
        ];
        let name = extract_device_name(&ad_data).unwrap();
        assert_eq!(name.as_str(), "BT1818");
    }

    #[test]
    fn extract_shortened_local_name() {
        let ad_data = [0x04, 0x08, b'B', b'T', b'1'];
        assert_eq!(extract_device_name(&ad_data).unwrap().as_str(), "BT1");
    }

    #[test]
    fn no_name_in_advertisement() {
        let ad_data = [0x02, 0x01, 0x06];
        assert!(extract_device_name(&ad_data).is_none());
        assert!(extract_device_name(&[]).is_none());
    }

    #[test]
    fn malformed_lengths_stop_parsing() {
        // len=0 terminates, len past the end is rejected
        assert!(extract_device_name(&[0x00, 0x09, b'A']).is_none());
        assert!(extract_device_name(&[0x05, 0x09, b'A', b'B']).is_none());
    }

    #[test]
    fn name_truncated_to_32_chars() {
        let mut ad_data = [0u8; 40];
        ad_data[0] = 35;
        ad_data[1] = AD_COMPLETE_NAME;
        for b in ad_data.iter_mut().take(37).skip(2) {
            *b = b'X';
        }
        let name = extract_device_name(&ad_data).unwrap();
        assert_eq!(name.len(), 32);
    }
}
