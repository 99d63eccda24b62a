/// JSON command protocol between the radar and a companion app.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::label::LabelString;
use crate::mac::MacString;
use crate::recent::DeviceStatus;

/// Longest label accepted on the wire; the registry shortens it further
pub type WireLabel = String<64>;

/// Which persistent list an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListKind {
    #[serde(rename = "wl")]
    Whitelist,
    #[serde(rename = "bl")]
    Blacklist,
}

/// Messages sent from the device to the companion app
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage {
    /// One recent-log record. `mac` is empty past the end of the log.
    #[serde(rename = "recent")]
    Recent {
        index: u16,
        mac: MacString,
        label: LabelString,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<DeviceStatus>,
        hits: u16,
        /// Scanner clock (ms) at the latest sighting
        last_seen: u32,
    },
    /// One list slot. `mac` is empty for a hole.
    #[serde(rename = "entry")]
    Entry {
        list: ListKind,
        index: u16,
        mac: MacString,
        label: LabelString,
    },
    /// One surveillance alert. `mac` is empty past the end.
    #[serde(rename = "alert")]
    Alert { index: u16, mac: MacString },
    /// Surveillance state after an `arm` command
    #[serde(rename = "surveillance")]
    Surveillance { armed: bool, alerts: u8 },
    /// Outcome of a mutation
    #[serde(rename = "ack")]
    Ack {
        ok: bool,
        /// Slot touched by the mutation
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<u8>,
        /// Devices added by `wl_add_all`
        #[serde(skip_serializing_if = "Option::is_none")]
        added: Option<u8>,
        /// Short error code, see `RegistryError::code`
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'static str>,
    },
    /// Registry status report
    #[serde(rename = "status")]
    Status {
        recent: u8,
        whitelisted: u8,
        blacklisted: u8,
        detections: u32,
        ignored: u32,
        /// Whether list writes are waiting for a retry
        pending: bool,
        armed: bool,
        alerts: u8,
        min_rssi: i8,
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
    },
}

impl DeviceMessage {
    pub const fn ok() -> Self {
        DeviceMessage::Ack {
            ok: true,
            slot: None,
            added: None,
            error: None,
        }
    }

    pub fn ok_slot(slot: usize) -> Self {
        DeviceMessage::Ack {
            ok: true,
            slot: u8::try_from(slot).ok(),
            added: None,
            error: None,
        }
    }

    pub fn ok_added(count: usize) -> Self {
        DeviceMessage::Ack {
            ok: true,
            slot: None,
            added: Some(u8::try_from(count).unwrap_or(u8::MAX)),
            error: None,
        }
    }

    pub const fn err(code: &'static str) -> Self {
        DeviceMessage::Ack {
            ok: false,
            slot: None,
            added: None,
            error: Some(code),
        }
    }
}

/// Commands sent from the companion app to the device.
///
/// Indices are `u16` on the wire so any out-of-range index still gets a
/// blank reply rather than failing to parse.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, PartialEq)]
pub enum HostCommand {
    /// Read the recent-log record at `index` (0 = newest)
    Recent { index: u16 },
    /// Read a whitelist slot
    WhitelistGet { index: u16 },
    WhitelistAdd { mac: MacString, label: WireLabel },
    WhitelistRemove { mac: MacString },
    WhitelistLabel { mac: MacString, label: WireLabel },
    /// Whitelist the device at recent-log `index`
    WhitelistRecent { index: u16, label: WireLabel },
    /// Whitelist every logged device on neither list
    WhitelistAllRecent,
    WhitelistClear,
    /// Read a blacklist slot
    BlacklistGet { index: u16 },
    BlacklistAdd { mac: MacString, label: WireLabel },
    BlacklistRemove { mac: MacString },
    /// Arm or disarm surveillance; toggle when `armed` is absent
    Arm { armed: Option<bool> },
    /// Read the alert at `index` (0 = oldest)
    Alert { index: u16 },
    /// Retry pending list writes
    Flush,
    /// Request current status
    GetStatus,
    /// Update minimum RSSI threshold
    SetRssi {
        /// Minimum RSSI (negative dBm value)
        min_rssi: i8,
    },
}

/// Wire format for host commands: a flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: heapless::String<16>,
    #[serde(default)]
    pub index: Option<u16>,
    #[serde(default)]
    pub mac: Option<MacString>,
    #[serde(default)]
    pub label: Option<WireLabel>,
    #[serde(default)]
    pub min_rssi: Option<i8>,
    #[serde(default)]
    pub armed: Option<bool>,
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(msg: &DeviceMessage) -> std::string::String {
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serde_json_core::to_slice(msg, &mut buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap().into()
    }

    // ── Acks ────────────────────────────────────────────────────────

    #[test]
    fn serialize_ack_with_slot() {
        assert_eq!(
            to_json(&DeviceMessage::ok_slot(2)),
            r#"{"type":"ack","ok":true,"slot":2}"#
        );
    }

    #[test]
    fn serialize_ack_error() {
        assert_eq!(
            to_json(&DeviceMessage::err("full")),
            r#"{"type":"ack","ok":false,"error":"full"}"#
        );
        assert_eq!(to_json(&DeviceMessage::ok()), r#"{"type":"ack","ok":true}"#);
    }

    #[test]
    fn serialize_ack_added() {
        assert_eq!(
            to_json(&DeviceMessage::ok_added(3)),
            r#"{"type":"ack","ok":true,"added":3}"#
        );
    }

    #[test]
    fn serialize_surveillance_and_alert() {
        assert_eq!(
            to_json(&DeviceMessage::Surveillance {
                armed: true,
                alerts: 0
            }),
            r#"{"type":"surveillance","armed":true,"alerts":0}"#
        );
        assert_eq!(
            to_json(&DeviceMessage::Alert {
                index: 300,
                mac: MacString::new()
            }),
            r#"{"type":"alert","index":300,"mac":""}"#
        );
    }

    // ── Records ─────────────────────────────────────────────────────

    #[test]
    fn serialize_recent_message() {
        let msg = DeviceMessage::Recent {
            index: 0,
            mac: MacString::try_from("24:0A:C4:12:34:56").unwrap(),
            label: LabelString::try_from("Espressif Inc.").unwrap(),
            status: Some(DeviceStatus::Known),
            hits: 3,
            last_seen: 42_000,
        };
        let json = to_json(&msg);
        assert!(json.starts_with(r#"{"type":"recent""#));
        assert!(json.contains(r#""mac":"24:0A:C4:12:34:56""#));
        assert!(json.contains(r#""status":"known""#));
        assert!(json.contains(r#""hits":3"#));
        assert!(json.contains(r#""last_seen":42000"#));
    }

    #[test]
    fn serialize_empty_recent_omits_status() {
        let msg = DeviceMessage::Recent {
            index: 19,
            mac: MacString::new(),
            label: LabelString::new(),
            status: None,
            hits: 0,
            last_seen: 0,
        };
        let json = to_json(&msg);
        assert!(json.contains(r#""mac":"""#));
        assert!(!json.contains("status"));
    }

    #[test]
    fn serialize_entry_message() {
        let msg = DeviceMessage::Entry {
            list: ListKind::Blacklist,
            index: 4,
            mac: MacString::try_from("AA:BB:CC:11:22:33").unwrap(),
            label: LabelString::try_from("Tracker").unwrap(),
        };
        assert_eq!(
            to_json(&msg),
            r#"{"type":"entry","list":"bl","index":4,"mac":"AA:BB:CC:11:22:33","label":"Tracker"}"#
        );
    }

    #[test]
    fn serialize_status_message() {
        let msg = DeviceMessage::Status {
            recent: 7,
            whitelisted: 2,
            blacklisted: 0,
            detections: 120,
            ignored: 5,
            pending: false,
            armed: true,
            alerts: 2,
            min_rssi: -90,
            board: "test_board",
            version: "0.1.0",
        };
        let json = to_json(&msg);
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""recent":7"#));
        assert!(json.contains(r#""min_rssi":-90"#));
        assert!(json.contains(r#""armed":true,"alerts":2"#));
        assert!(json.contains(r#""board":"test_board""#));
    }

    // ── Version constant ────────────────────────────────────────────

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
