/// Rolling log of recent detections, newest first.
///
/// Fixed capacity, no allocation, not persisted. Index 0 is always the most
/// recently seen device. A MAC appears at most once: seeing it again moves
/// it back to the front (dedupe-and-refresh).
use heapless::Vec;
use serde::Serialize;

use crate::label::{display_label, render_line, LabelString, LineString};
use crate::mac::MacAddress;

/// Number of records the log keeps.
pub const RECENT_CAPACITY: usize = 20;

/// How many of the newest records a compact display shows.
pub const RECENT_DISPLAY_WINDOW: usize = 10;

/// How a detected device relates to the user's lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// On neither list
    Unknown,
    /// Whitelisted
    Known,
    /// Blacklisted
    Blocked,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Known => "known",
            DeviceStatus::Blocked => "blocked",
        }
    }
}

/// A BLE advertisement as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    pub mac: MacAddress,
    pub rssi: i8,
    /// Advertised local name, empty if none
    pub name: LabelString,
    /// Scanner clock in milliseconds (uptime), 0 if unknown
    pub timestamp: u32,
}

impl DetectionEvent {
    pub fn new(mac: [u8; 6], rssi: i8, name: &str) -> Self {
        Self {
            mac: MacAddress::new(mac),
            rssi,
            name: display_label(name),
            timestamp: 0,
        }
    }

    /// Stamp the event with the scanner clock.
    pub fn at(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// One observed device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRecord {
    pub mac: MacAddress,
    /// Best-effort display label, empty if nothing is known
    pub label: LabelString,
    /// Last non-empty advertised name
    pub name: LabelString,
    pub status: DeviceStatus,
    /// Times this device was seen while it stayed in the log
    pub hits: u16,
    /// Timestamp of the latest sighting
    pub last_seen: u32,
}

impl DetectionRecord {
    /// `"<MAC> | <label>"`, or the bare MAC without a label.
    pub fn line(&self) -> LineString {
        render_line(&self.mac, &self.label)
    }
}

pub struct RecentDetectionLog<const N: usize = RECENT_CAPACITY> {
    records: Vec<DetectionRecord, N>,
}

impl<const N: usize> RecentDetectionLog<N> {
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record a sighting of `event.mac` shown as `label`.
    ///
    /// A MAC already in the log moves to index 0 and keeps its old label
    /// and name unless the new ones are non-empty. A new MAC is inserted at
    /// index 0, evicting the oldest record when the log is full.
    pub fn record(&mut self, event: &DetectionEvent, label: &str, status: DeviceStatus) {
        let record = match self.position(&event.mac) {
            Some(i) => {
                let mut existing = self.records.remove(i);
                if !label.is_empty() {
                    existing.label = display_label(label);
                }
                if !event.name.is_empty() {
                    existing.name = event.name.clone();
                }
                existing.status = status;
                existing.hits = existing.hits.saturating_add(1);
                existing.last_seen = event.timestamp;
                existing
            }
            None => {
                if self.records.is_full() {
                    if let Some(evicted) = self.records.pop() {
                        log::trace!("Recent log full, evicting {}", evicted.mac);
                    }
                }
                DetectionRecord {
                    mac: event.mac,
                    label: display_label(label),
                    name: event.name.clone(),
                    status,
                    hits: 1,
                    last_seen: event.timestamp,
                }
            }
        };
        // Room was made above
        let _ = self.records.insert(0, record);
    }

    /// Record at age `index` (0 = newest), or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&DetectionRecord> {
        self.records.get(index)
    }

    /// The record for `mac`, if it is in the log.
    pub fn find(&self, mac: &MacAddress) -> Option<&DetectionRecord> {
        self.records.iter().find(|r| r.mac == *mac)
    }

    /// Rendered line at age `index`, or an empty string past the end.
    pub fn line(&self, index: usize) -> LineString {
        self.get(index).map(DetectionRecord::line).unwrap_or_default()
    }

    /// Refresh the status and label of a logged device in place.
    ///
    /// Used when list membership changes so the log does not keep showing
    /// stale information. Order is unchanged. Returns false if the MAC is
    /// not in the log.
    pub fn update_status(&mut self, mac: &MacAddress, status: DeviceStatus, label: &str) -> bool {
        match self.position(mac) {
            Some(i) => {
                let record = &mut self.records[i];
                record.status = status;
                record.label = display_label(label);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records from newest to oldest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DetectionRecord> {
        self.records.iter()
    }

    fn position(&self, mac: &MacAddress) -> Option<usize> {
        self.records.iter().position(|r| r.mac == *mac)
    }
}

impl<const N: usize> Default for RecentDetectionLog<N> {
    fn default() -> Self {
        Self::new()
    }
}
