//! BLE advertisement parsing for the scan callback.
//!
//! Turns a raw advertising payload into a `DetectionEvent`. Safe to call
//! from the scan callback: no allocation, no blocking, no storage access.

use smartradar::DetectionEvent;

/// AD type: shortened local name
const AD_SHORT_NAME: u8 = 0x08;
/// AD type: complete local name
const AD_COMPLETE_NAME: u8 = 0x09;

/// Parse BLE advertisement data (AD structures) into a detection.
///
/// AD structure format: [length] [type] [data...]
/// The complete local name (0x09) is preferred over the shortened one
/// (0x08). Names that are not valid UTF-8 are ignored. Parsing stops at a
/// zero length or a structure running past the payload.
pub fn parse_advertisement(addr: &[u8; 6], rssi: i8, ad_data: &[u8]) -> DetectionEvent {
    DetectionEvent::new(*addr, rssi, local_name(ad_data).unwrap_or(""))
}

/// The advertised local name, if any.
pub fn local_name(ad_data: &[u8]) -> Option<&str> {
    let mut short = None;

    let mut pos = 0;
    while pos < ad_data.len() {
        let len = ad_data[pos] as usize;
        if len == 0 || pos + 1 + len > ad_data.len() {
            break;
        }

        let ad_type = ad_data[pos + 1];
        let data = &ad_data[pos + 2..pos + 1 + len];

        match ad_type {
            AD_COMPLETE_NAME => {
                if let Ok(name) = core::str::from_utf8(data) {
                    return Some(name);
                }
            }
            AD_SHORT_NAME => {
                if short.is_none() {
                    short = core::str::from_utf8(data).ok();
                }
            }
            _ => {}
        }

        pos += 1 + len;
    }

    short
}
