/// Communication layer: NDJSON command transport.
///
/// The companion app writes one JSON command per line over the BLE RX
/// characteristic or serial, and reads one JSON reply per line back.
/// Everything here is transport-agnostic; the firmware moves the bytes.
use crate::board;
use crate::list::ListStore;
use crate::protocol::{DeviceMessage, HostCommand, ListKind, RawCommand, MAX_MSG_LEN, VERSION};
use crate::registry::DeviceRegistry;
use crate::storage::KvStore;

/// BLE GATT service UUIDs for the command service.
pub mod ble_uuids {
    /// Primary service UUID
    pub const SERVICE: &str = "5b2e0001-8f3d-4c61-9a2e-6d1f0b7c3e42";
    /// TX characteristic: replies, notify
    pub const TX_CHAR: &str = "5b2e0002-8f3d-4c61-9a2e-6d1f0b7c3e42";
    /// RX characteristic: commands, write
    pub const RX_CHAR: &str = "5b2e0003-8f3d-4c61-9a2e-6d1f0b7c3e42";
}

/// BLE advertising name
pub const BLE_ADV_NAME: &str = "SmartRadar";

/// Maximum BLE notification payload (MTU-3)
pub const BLE_MAX_NOTIFY: usize = 20;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Deserialize a HostCommand from a JSON byte slice.
///
/// Returns `None` for empty input, malformed JSON, an unknown `cmd` or a
/// command missing a required field.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    let label = raw.label.unwrap_or_default();

    let cmd = match raw.cmd.as_str() {
        "recent" => HostCommand::Recent { index: raw.index? },
        "wl_get" => HostCommand::WhitelistGet { index: raw.index? },
        "wl_add" => HostCommand::WhitelistAdd { mac: raw.mac?, label },
        "wl_remove" => HostCommand::WhitelistRemove { mac: raw.mac? },
        "wl_label" => HostCommand::WhitelistLabel { mac: raw.mac?, label },
        "wl_recent" => HostCommand::WhitelistRecent {
            index: raw.index?,
            label,
        },
        "wl_add_all" => HostCommand::WhitelistAllRecent,
        "wl_clear" => HostCommand::WhitelistClear,
        "bl_get" => HostCommand::BlacklistGet { index: raw.index? },
        "bl_add" => HostCommand::BlacklistAdd { mac: raw.mac?, label },
        "bl_remove" => HostCommand::BlacklistRemove { mac: raw.mac? },
        "arm" => HostCommand::Arm { armed: raw.armed },
        "alert" => HostCommand::Alert { index: raw.index? },
        "flush" => HostCommand::Flush,
        "status" => HostCommand::GetStatus,
        "set_rssi" => HostCommand::SetRssi {
            min_rssi: raw.min_rssi?,
        },
        other => {
            log::debug!("Unknown command: {}", other);
            return None;
        }
    };
    Some(cmd)
}

/// Apply a host command to the registry and build the reply.
pub fn handle_command<S: KvStore>(cmd: HostCommand, registry: &mut DeviceRegistry<S>) -> DeviceMessage {
    let mutation = match cmd {
        HostCommand::Recent { index } => {
            let record = registry.recent(index.into());
            return DeviceMessage::Recent {
                index,
                mac: record.map(|r| r.mac.to_mac_string()).unwrap_or_default(),
                label: record.map(|r| r.label.clone()).unwrap_or_default(),
                status: record.map(|r| r.status),
                hits: record.map_or(0, |r| r.hits),
                last_seen: record.map_or(0, |r| r.last_seen),
            };
        }
        HostCommand::Alert { index } => {
            return DeviceMessage::Alert {
                index,
                mac: registry.alert_mac(index.into()),
            };
        }
        HostCommand::Arm { armed } => {
            let armed = armed.unwrap_or(!registry.is_armed());
            return match registry.set_armed(armed) {
                Ok(()) => DeviceMessage::Surveillance {
                    armed,
                    alerts: saturate(registry.alerts().len()),
                },
                Err(e) => DeviceMessage::err(e.code()),
            };
        }
        HostCommand::WhitelistAllRecent => {
            return match registry.whitelist_all_recent() {
                Ok(added) => DeviceMessage::ok_added(added),
                Err(e) => DeviceMessage::err(e.code()),
            };
        }
        HostCommand::WhitelistGet { index } => {
            return entry(ListKind::Whitelist, registry.whitelist(), index);
        }
        HostCommand::BlacklistGet { index } => {
            return entry(ListKind::Blacklist, registry.blacklist(), index);
        }
        HostCommand::GetStatus => return status(registry),
        HostCommand::SetRssi { min_rssi } => {
            let mut config = *registry.config();
            config.min_rssi = min_rssi;
            registry.set_config(config);
            log::info!("RSSI threshold set to {}", min_rssi);
            return DeviceMessage::ok();
        }
        HostCommand::WhitelistAdd { mac, label } => registry.add_to_whitelist(&mac, &label).map(Some),
        HostCommand::WhitelistRemove { mac } => registry.remove_from_whitelist(&mac).map(Some),
        HostCommand::WhitelistLabel { mac, label } => {
            registry.set_whitelist_label(&mac, &label).map(|()| None)
        }
        HostCommand::WhitelistRecent { index, label } => {
            registry.whitelist_recent(index.into(), &label).map(Some)
        }
        HostCommand::WhitelistClear => registry.clear_whitelist().map(|()| None),
        HostCommand::BlacklistAdd { mac, label } => registry.add_to_blacklist(&mac, &label).map(Some),
        HostCommand::BlacklistRemove { mac } => registry.remove_from_blacklist(&mac).map(Some),
        HostCommand::Flush => registry.flush().map(|_| None),
    };

    match mutation {
        Ok(Some(slot)) => DeviceMessage::ok_slot(slot),
        Ok(None) => DeviceMessage::ok(),
        Err(e) => {
            log::debug!("Command failed: {}", e);
            DeviceMessage::err(e.code())
        }
    }
}

fn entry<const N: usize>(list: ListKind, store: &ListStore<N>, index: u16) -> DeviceMessage {
    DeviceMessage::Entry {
        list,
        index,
        mac: store.get_mac(index.into()),
        label: store.get_label(index.into()),
    }
}

fn status<S: KvStore>(registry: &DeviceRegistry<S>) -> DeviceMessage {
    let stats = registry.stats();
    DeviceMessage::Status {
        recent: saturate(stats.recent),
        whitelisted: saturate(stats.whitelisted),
        blacklisted: saturate(stats.blacklisted),
        detections: stats.detections,
        ignored: stats.ignored,
        pending: stats.pending_writes,
        armed: stats.armed,
        alerts: saturate(stats.alerts),
        min_rssi: registry.config().min_rssi,
        board: board::BOARD_NAME,
        version: VERSION,
    }
}

fn saturate(n: usize) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

// ── Serial NDJSON reader ───────────────────────────────────────────────

/// NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
    /// Set after an overflow until the next newline
    discarding: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
            discarding: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let complete = self.pos > 0 && !self.discarding;
            let len = self.pos;
            self.pos = 0;
            self.discarding = false;
            complete.then(|| &self.buf[..len])
        } else if self.discarding {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: drop the rest of this line
            log::warn!("Command line exceeds {} bytes, discarding", MAX_MSG_LEN);
            self.pos = 0;
            self.discarding = true;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && matches!(data[end - 1], b' ' | b'\n' | b'\r' | b'\t') {
        end -= 1;
    }
    &data[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{create, DetectionEvent, RegistryConfig};
    use crate::storage::MemoryStore;

    fn registry() -> DeviceRegistry<MemoryStore> {
        create(RegistryConfig::new(), MemoryStore::<48>::new())
    }

    fn run(reg: &mut DeviceRegistry<MemoryStore>, json: &str) -> std::string::String {
        let cmd = parse_command(json.as_bytes()).expect("command should parse");
        let reply = handle_command(cmd, reg);
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serialize_message(&reply, &mut buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap().into()
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_recent() {
        assert_eq!(
            parse_command(br#"{"cmd":"recent","index":3}"#),
            Some(HostCommand::Recent { index: 3 })
        );
    }

    #[test]
    fn parse_whitelist_add_with_trailing_newline() {
        let cmd = parse_command(b"{\"cmd\":\"wl_add\",\"mac\":\"AA:BB:CC:11:22:33\",\"label\":\"Watch\"}\r\n");
        match cmd {
            Some(HostCommand::WhitelistAdd { mac, label }) => {
                assert_eq!(mac.as_str(), "AA:BB:CC:11:22:33");
                assert_eq!(label.as_str(), "Watch");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_label_defaults_to_empty() {
        match parse_command(br#"{"cmd":"wl_recent","index":0}"#) {
            Some(HostCommand::WhitelistRecent { index, label }) => {
                assert_eq!(index, 0);
                assert!(label.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command(br#"{"cmd":"status"}"#), Some(HostCommand::GetStatus));
        assert_eq!(parse_command(br#"{"cmd":"wl_clear"}"#), Some(HostCommand::WhitelistClear));
        assert_eq!(parse_command(br#"{"cmd":"flush"}"#), Some(HostCommand::Flush));
        assert_eq!(
            parse_command(br#"{"cmd":"wl_add_all"}"#),
            Some(HostCommand::WhitelistAllRecent)
        );
        assert_eq!(parse_command(br#"{"cmd":"arm"}"#), Some(HostCommand::Arm { armed: None }));
        assert_eq!(
            parse_command(br#"{"cmd":"arm","armed":false}"#),
            Some(HostCommand::Arm { armed: Some(false) })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_rssi","min_rssi":-75}"#),
            Some(HostCommand::SetRssi { min_rssi: -75 })
        );
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(parse_command(b""), None);
        assert_eq!(parse_command(b"  \n"), None);
        assert_eq!(parse_command(b"not json"), None);
        assert_eq!(parse_command(br#"{"cmd":"reboot"}"#), None);
        // Required field missing
        assert_eq!(parse_command(br#"{"cmd":"wl_remove"}"#), None);
        assert_eq!(parse_command(br#"{"cmd":"wl_get"}"#), None);
        assert_eq!(parse_command(br#"{"cmd":"alert"}"#), None);
    }

    #[test]
    fn large_index_gets_blank_reply() {
        let mut reg = registry();
        assert_eq!(
            parse_command(br#"{"cmd":"recent","index":300}"#),
            Some(HostCommand::Recent { index: 300 })
        );
        let reply = run(&mut reg, r#"{"cmd":"recent","index":300}"#);
        assert!(reply.contains(r#""index":300,"mac":"""#));
        let reply = run(&mut reg, r#"{"cmd":"wl_get","index":1000}"#);
        assert!(reply.contains(r#""index":1000,"mac":"""#));
    }

    // ── Handling ────────────────────────────────────────────────────

    #[test]
    fn whitelist_round_trip() {
        let mut reg = registry();
        assert_eq!(
            run(&mut reg, r#"{"cmd":"wl_add","mac":"aa:bb:cc:11:22:33","label":"Watch"}"#),
            "{\"type\":\"ack\",\"ok\":true,\"slot\":0}\n"
        );
        assert_eq!(
            run(&mut reg, r#"{"cmd":"wl_get","index":0}"#),
            "{\"type\":\"entry\",\"list\":\"wl\",\"index\":0,\"mac\":\"AA:BB:CC:11:22:33\",\"label\":\"Watch\"}\n"
        );
        assert_eq!(
            run(&mut reg, r#"{"cmd":"wl_label","mac":"AA:BB:CC:11:22:33","label":"Band"}"#),
            "{\"type\":\"ack\",\"ok\":true}\n"
        );
        assert_eq!(reg.whitelist_label(0).as_str(), "Band");
        assert_eq!(
            run(&mut reg, r#"{"cmd":"wl_remove","mac":"AA:BB:CC:11:22:33"}"#),
            "{\"type\":\"ack\",\"ok\":true,\"slot\":0}\n"
        );
        assert_eq!(
            run(&mut reg, r#"{"cmd":"wl_remove","mac":"AA:BB:CC:11:22:33"}"#),
            "{\"type\":\"ack\",\"ok\":false,\"error\":\"not_found\"}\n"
        );
    }

    #[test]
    fn errors_map_to_codes() {
        let mut reg = registry();
        assert!(run(&mut reg, r#"{"cmd":"wl_add","mac":"nope"}"#).contains(r#""error":"invalid_mac""#));
        run(&mut reg, r#"{"cmd":"wl_add","mac":"AA:BB:CC:11:22:33"}"#);
        assert!(run(&mut reg, r#"{"cmd":"wl_add","mac":"AA:BB:CC:11:22:33"}"#)
            .contains(r#""error":"duplicate""#));

        reg.store_mut().fail_writes = true;
        assert!(run(&mut reg, r#"{"cmd":"bl_add","mac":"AA:BB:CC:44:55:66"}"#)
            .contains(r#""error":"storage""#));
        reg.store_mut().fail_writes = false;
        assert_eq!(run(&mut reg, r#"{"cmd":"flush"}"#), "{\"type\":\"ack\",\"ok\":true}\n");
    }

    #[test]
    fn recent_and_promote() {
        let mut reg = registry();
        reg.on_detection(&DetectionEvent::new([0x24, 0x0A, 0xC4, 1, 2, 3], -50, ""));

        let reply = run(&mut reg, r#"{"cmd":"recent","index":0}"#);
        assert!(reply.contains(r#""mac":"24:0A:C4:01:02:03""#));
        assert!(reply.contains(r#""label":"Espressif Inc.""#));
        assert!(reply.contains(r#""status":"unknown""#));

        let reply = run(&mut reg, r#"{"cmd":"recent","index":9}"#);
        assert!(reply.contains(r#""mac":"""#));
        assert!(!reply.contains("status"));

        assert!(run(&mut reg, r#"{"cmd":"wl_recent","index":0,"label":"Plug"}"#).contains(r#""slot":0"#));
        let reply = run(&mut reg, r#"{"cmd":"recent","index":0}"#);
        assert!(reply.contains(r#""status":"known""#));
        assert!(reply.contains(r#""label":"Plug""#));
    }

    #[test]
    fn blacklist_and_status() {
        let mut reg = registry();
        run(&mut reg, r#"{"cmd":"bl_add","mac":"02:00:00:00:00:01","label":"Tracker"}"#);
        let reply = run(&mut reg, r#"{"cmd":"bl_get","index":0}"#);
        assert!(reply.contains(r#""list":"bl""#));
        assert!(reply.contains(r#""label":"Tracker""#));

        run(&mut reg, r#"{"cmd":"set_rssi","min_rssi":-70}"#);
        let reply = run(&mut reg, r#"{"cmd":"status"}"#);
        assert!(reply.contains(r#""blacklisted":1"#));
        assert!(reply.contains(r#""min_rssi":-70"#));
        assert!(reply.contains(r#""pending":false"#));
        assert_eq!(reg.config().min_rssi, -70);
    }

    #[test]
    fn surveillance_commands() {
        let mut reg = registry();
        assert_eq!(
            run(&mut reg, r#"{"cmd":"arm"}"#),
            "{\"type\":\"surveillance\",\"armed\":true,\"alerts\":0}\n"
        );
        reg.on_detection(&DetectionEvent::new([0x02, 0, 0, 0, 0, 1], -50, ""));

        assert_eq!(
            run(&mut reg, r#"{"cmd":"alert","index":0}"#),
            "{\"type\":\"alert\",\"index\":0,\"mac\":\"02:00:00:00:00:01\"}\n"
        );
        assert!(run(&mut reg, r#"{"cmd":"status"}"#).contains(r#""armed":true,"alerts":1"#));

        assert_eq!(
            run(&mut reg, r#"{"cmd":"arm","armed":false}"#),
            "{\"type\":\"surveillance\",\"armed\":false,\"alerts\":0}\n"
        );
        assert!(run(&mut reg, r#"{"cmd":"alert","index":0}"#).contains(r#""mac":"""#));
    }

    #[test]
    fn whitelist_all_recent_command() {
        let mut reg = registry();
        reg.on_detection(&DetectionEvent::new([0x24, 0x0A, 0xC4, 1, 2, 3], -50, ""));
        reg.on_detection(&DetectionEvent::new([0x02, 0, 0, 0, 0, 1], -50, "Tag"));
        assert_eq!(
            run(&mut reg, r#"{"cmd":"wl_add_all"}"#),
            "{\"type\":\"ack\",\"ok\":true,\"added\":2}\n"
        );
        assert_eq!(reg.whitelist().len(), 2);
    }

    #[test]
    fn clear_whitelist_command() {
        let mut reg = registry();
        run(&mut reg, r#"{"cmd":"wl_add","mac":"AA:BB:CC:11:22:33"}"#);
        run(&mut reg, r#"{"cmd":"wl_add","mac":"AA:BB:CC:44:55:66"}"#);
        assert_eq!(run(&mut reg, r#"{"cmd":"wl_clear"}"#), "{\"type\":\"ack\",\"ok\":true}\n");
        assert!(reg.whitelist().is_empty());
    }

    // ── LineReader ──────────────────────────────────────────────────

    #[test]
    fn line_reader_splits_on_newline() {
        let mut reader = LineReader::new();
        let mut lines = std::vec::Vec::new();
        for &b in b"{\"cmd\":\"status\"}\r\n\n{\"cmd\":\"flush\"}\n" {
            if let Some(line) = reader.feed(b) {
                lines.push(line.to_vec());
            }
        }
        assert_eq!(lines, [b"{\"cmd\":\"status\"}".to_vec(), b"{\"cmd\":\"flush\"}".to_vec()]);
    }

    #[test]
    fn line_reader_discards_overlong_line() {
        let mut reader = LineReader::new();
        for _ in 0..MAX_MSG_LEN + 10 {
            assert!(reader.feed(b'x').is_none());
        }
        assert!(reader.feed(b'\n').is_none());

        let mut got = None;
        for &b in b"ok\n" {
            if let Some(line) = reader.feed(b) {
                got = Some(line.to_vec());
            }
        }
        assert_eq!(got.as_deref(), Some(&b"ok"[..]));
    }
}
