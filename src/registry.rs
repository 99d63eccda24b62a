/// The device registry: recent detections plus the persistent lists.
///
/// A single owner (`&mut self`) ties together the vendor table, the recent
/// detection log, the whitelist and the blacklist. Scan code feeds it
/// [`DetectionEvent`]s; the edit layer and the command protocol use the
/// accessor surface. Nothing here blocks except the storage writes issued
/// by list mutations and by arming, and detections never write storage.
///
/// While armed (surveillance mode), the first sighting of each device that
/// is not whitelisted raises one alert. Disarming forgets all alerts.
use heapless::Vec;
use serde::Serialize;

use crate::error::RegistryError;
use crate::label::{display_label, LabelString, LineString};
use crate::list::{BlacklistStore, ListStore, WhitelistStore, WHITELIST_CAPACITY};
use crate::mac::{MacAddress, MacString};
use crate::oui::VendorTable;
use crate::recent::{DetectionRecord, DeviceStatus, RecentDetectionLog, RECENT_CAPACITY};
use crate::storage::KvStore;

pub use crate::recent::DetectionEvent;

/// Most alerts remembered while armed.
pub const MAX_ALERTS: usize = 32;

/// Signals at or below this level (dBm) never raise an alert.
pub const ALERT_MIN_RSSI: i8 = -90;

/// Storage key of the persisted surveillance flag.
pub const ARMED_KEY: &str = "armed";

/// Runtime registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Minimum RSSI (dBm). Weaker detections are ignored.
    pub min_rssi: i8,
    /// Whether whitelisted devices are entered in the recent log
    pub log_known: bool,
    /// Surveillance mode. Only the boot default: a value persisted with
    /// [`DeviceRegistry::set_armed`] takes precedence.
    pub armed: bool,
}

impl RegistryConfig {
    pub const fn new() -> Self {
        Self {
            min_rssi: -100,
            log_known: true,
            armed: false,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a detection that made it into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    pub status: DeviceStatus,
    /// First sighting of a non-whitelisted device while armed
    pub alert: bool,
}

/// Counters and sizes reported by the `status` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub recent: usize,
    pub whitelisted: usize,
    pub blacklisted: usize,
    /// Detections applied to the log
    pub detections: u32,
    /// Detections dropped by RSSI or `log_known`
    pub ignored: u32,
    /// Whether some list slot or the armed flag still has a failed write
    pub pending_writes: bool,
    pub armed: bool,
    pub alerts: usize,
}

pub struct DeviceRegistry<S: KvStore> {
    config: RegistryConfig,
    store: S,
    vendors: VendorTable,
    recent: RecentDetectionLog,
    whitelist: WhitelistStore,
    blacklist: BlacklistStore,
    alerts: Vec<MacAddress, MAX_ALERTS>,
    /// The armed flag failed to persist
    armed_dirty: bool,
    detections: u32,
    ignored: u32,
}

/// Build a registry over `store` with the built-in vendor table and load
/// both lists.
pub fn create<S: KvStore>(config: RegistryConfig, store: S) -> DeviceRegistry<S> {
    let mut registry = DeviceRegistry::new(config, store, VendorTable::builtin());
    registry.setup();
    registry
}

impl<S: KvStore> DeviceRegistry<S> {
    /// An empty registry. Call [`setup`](Self::setup) to load persisted lists.
    pub fn new(config: RegistryConfig, store: S, vendors: VendorTable) -> Self {
        Self {
            config,
            store,
            vendors,
            recent: RecentDetectionLog::new(),
            whitelist: ListStore::whitelist(),
            blacklist: ListStore::blacklist(),
            alerts: Vec::new(),
            armed_dirty: false,
            detections: 0,
            ignored: 0,
        }
    }

    /// Load the whitelist, the blacklist and the armed flag from storage.
    pub fn setup(&mut self) {
        if !self.vendors.is_well_formed() {
            log::error!("Vendor table is not sorted; lookups will miss");
        }
        let wl = self.whitelist.load(&self.store);
        let bl = self.blacklist.load(&self.store);

        let mut buf = [0u8; 1];
        match self.store.get(ARMED_KEY, &mut buf) {
            Ok(Some(b"1")) => self.config.armed = true,
            Ok(Some(b"0")) => self.config.armed = false,
            Ok(Some(other)) => log::warn!("Ignoring corrupt armed flag {:?}", other),
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read armed flag: {}", e),
        }

        log::info!(
            "Registry ready: {} vendors, {} whitelisted, {} blacklisted, {}",
            self.vendors.len(),
            wl,
            bl,
            if self.config.armed { "armed" } else { "disarmed" }
        );
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Replace the detection filters. `config.armed` is ignored; use
    /// [`set_armed`](Self::set_armed).
    pub fn set_config(&mut self, config: RegistryConfig) {
        self.config = RegistryConfig {
            armed: self.config.armed,
            ..config
        };
    }

    /// Apply one scan report. Returns how the device was logged, or `None`
    /// if the detection was filtered out.
    pub fn on_detection(&mut self, event: &DetectionEvent) -> Option<Sighting> {
        if event.rssi < self.config.min_rssi {
            self.ignored = self.ignored.wrapping_add(1);
            return None;
        }

        let status = self.status_of(&event.mac);
        if status == DeviceStatus::Known && !self.config.log_known {
            self.ignored = self.ignored.wrapping_add(1);
            return None;
        }

        let label = self.label_for(&event.mac, &event.name);
        self.recent.record(event, &label, status);
        self.detections = self.detections.wrapping_add(1);
        log::trace!("{} {} dBm {}", event.mac, event.rssi, status.as_str());

        let alert = self.config.armed
            && status != DeviceStatus::Known
            && event.rssi > ALERT_MIN_RSSI
            && self.raise_alert(event.mac);
        Some(Sighting { status, alert })
    }

    // Surveillance

    pub fn is_armed(&self) -> bool {
        self.config.armed
    }

    /// Arm or disarm surveillance and persist the choice. Disarming clears
    /// all alerts. Setting the current state again writes nothing.
    ///
    /// On a storage failure the new state is still in effect and
    /// [`flush`](Self::flush) retries the write.
    pub fn set_armed(&mut self, armed: bool) -> Result<(), RegistryError> {
        if !armed {
            self.alerts.clear();
        }
        if armed == self.config.armed && !self.armed_dirty {
            return Ok(());
        }
        self.config.armed = armed;
        log::info!("Surveillance {}", if armed { "armed" } else { "disarmed" });
        self.write_armed()
    }

    /// Devices that raised an alert, oldest first.
    pub fn alerts(&self) -> &[MacAddress] {
        &self.alerts
    }

    /// MAC of the alert at `index`, or `""`.
    pub fn alert_mac(&self, index: usize) -> MacString {
        self.alerts
            .get(index)
            .map(MacAddress::to_mac_string)
            .unwrap_or_default()
    }

    pub fn is_alerted(&self, mac: &str) -> bool {
        MacAddress::parse(mac).is_ok_and(|m| self.alerts.contains(&m))
    }

    // Recent log

    /// `"<MAC> | <label>"` for the record at `age` (0 = newest), or `""`.
    pub fn recent_line(&self, age: usize) -> LineString {
        self.recent.line(age)
    }

    pub fn recent(&self, age: usize) -> Option<&DetectionRecord> {
        self.recent.get(age)
    }

    pub fn recent_log(&self) -> &RecentDetectionLog {
        &self.recent
    }

    // Whitelist

    pub fn whitelist_mac(&self, slot: usize) -> MacString {
        self.whitelist.get_mac(slot)
    }

    pub fn whitelist_label(&self, slot: usize) -> LabelString {
        self.whitelist.get_label(slot)
    }

    pub fn whitelist(&self) -> &WhitelistStore {
        &self.whitelist
    }

    pub fn is_whitelisted(&self, mac: &str) -> bool {
        MacAddress::parse(mac).is_ok_and(|m| self.whitelist.contains(&m))
    }

    pub fn add_to_whitelist(&mut self, mac: &str, label: &str) -> Result<usize, RegistryError> {
        let mac = MacAddress::parse(mac)?;
        let result = self.whitelist.add(&mut self.store, mac, label);
        self.after_list_change(&mac, &result);
        result
    }

    pub fn remove_from_whitelist(&mut self, mac: &str) -> Result<usize, RegistryError> {
        let mac = MacAddress::parse(mac)?;
        let result = self.whitelist.remove(&mut self.store, &mac);
        self.after_list_change(&mac, &result);
        result
    }

    pub fn set_whitelist_label(&mut self, mac: &str, label: &str) -> Result<(), RegistryError> {
        let mac = MacAddress::parse(mac)?;
        let result = self.whitelist.set_label(&mut self.store, &mac, label);
        self.after_list_change(&mac, &result);
        result
    }

    /// Whitelist the device logged at `age`.
    ///
    /// An empty `label` keeps whatever the log shows for it (usually the
    /// vendor name).
    pub fn whitelist_recent(&mut self, age: usize, label: &str) -> Result<usize, RegistryError> {
        let record = self.recent.get(age).ok_or(RegistryError::NotFound)?;
        let mac = record.mac;
        let shown = record.label.clone();
        let label = if label.is_empty() { shown.as_str() } else { label };

        let result = self.whitelist.add(&mut self.store, mac, label);
        self.after_list_change(&mac, &result);
        result
    }

    /// Whitelist every logged device that is on neither list, oldest first,
    /// each under the label the log shows. Returns how many were added.
    ///
    /// Stops when the whitelist fills; that is an error only if nothing
    /// could be added. Failed writes keep going and report the first
    /// storage error once all devices are in memory.
    pub fn whitelist_all_recent(&mut self) -> Result<usize, RegistryError> {
        let candidates: Vec<(MacAddress, LabelString), RECENT_CAPACITY> = self
            .recent
            .iter()
            .rev()
            .filter(|r| self.status_of(&r.mac) == DeviceStatus::Unknown)
            .map(|r| (r.mac, r.label.clone()))
            .collect();

        let mut added = 0;
        let mut failure = None;
        for (i, (mac, label)) in candidates.iter().enumerate() {
            let result = self.whitelist.add(&mut self.store, *mac, label);
            self.after_list_change(mac, &result);
            match result {
                Ok(_) => added += 1,
                Err(e @ RegistryError::Storage(_)) => {
                    added += 1;
                    failure.get_or_insert(e);
                }
                Err(RegistryError::Full) => {
                    log::warn!(
                        "Whitelist full, {} recent device(s) left out",
                        candidates.len() - i
                    );
                    if added == 0 {
                        failure.get_or_insert(RegistryError::Full);
                    }
                    break;
                }
                Err(e) => log::warn!("Skipping {}: {}", mac, e),
            }
        }
        if added > 0 {
            log::info!("Whitelisted {} recent device(s)", added);
        }
        failure.map_or(Ok(added), Err)
    }

    pub fn clear_whitelist(&mut self) -> Result<(), RegistryError> {
        let cleared: Vec<MacAddress, WHITELIST_CAPACITY> =
            self.whitelist.iter().map(|(_, e)| e.mac).collect();
        let result = self.whitelist.clear(&mut self.store);
        for mac in &cleared {
            self.refresh_recent(mac);
        }
        result
    }

    // Blacklist

    pub fn blacklist_mac(&self, slot: usize) -> MacString {
        self.blacklist.get_mac(slot)
    }

    pub fn blacklist_label(&self, slot: usize) -> LabelString {
        self.blacklist.get_label(slot)
    }

    pub fn blacklist(&self) -> &BlacklistStore {
        &self.blacklist
    }

    pub fn is_blacklisted(&self, mac: &str) -> bool {
        MacAddress::parse(mac).is_ok_and(|m| self.blacklist.contains(&m))
    }

    /// Flag a device with an optional note.
    pub fn add_to_blacklist(&mut self, mac: &str, note: &str) -> Result<usize, RegistryError> {
        let mac = MacAddress::parse(mac)?;
        let result = self.blacklist.add(&mut self.store, mac, note);
        self.after_list_change(&mac, &result);
        result
    }

    pub fn remove_from_blacklist(&mut self, mac: &str) -> Result<usize, RegistryError> {
        let mac = MacAddress::parse(mac)?;
        let result = self.blacklist.remove(&mut self.store, &mac);
        self.after_list_change(&mac, &result);
        result
    }

    // Persistence

    /// Retry writes that failed earlier. Returns how many keys were written.
    pub fn flush(&mut self) -> Result<usize, RegistryError> {
        let mut written =
            self.whitelist.flush(&mut self.store)? + self.blacklist.flush(&mut self.store)?;
        if self.armed_dirty {
            self.write_armed()?;
            written += 1;
        }
        if written > 0 {
            log::info!("Flushed {} pending slot(s)", written);
        }
        Ok(written)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            recent: self.recent.len(),
            whitelisted: self.whitelist.len(),
            blacklisted: self.blacklist.len(),
            detections: self.detections,
            ignored: self.ignored,
            pending_writes: self.whitelist.has_pending_writes()
                || self.blacklist.has_pending_writes()
                || self.armed_dirty,
            armed: self.config.armed,
            alerts: self.alerts.len(),
        }
    }

    pub fn vendors(&self) -> &VendorTable {
        &self.vendors
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Tear down and hand the store back.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Whitelisting wins over blacklisting.
    fn status_of(&self, mac: &MacAddress) -> DeviceStatus {
        if self.whitelist.contains(mac) {
            DeviceStatus::Known
        } else if self.blacklist.contains(mac) {
            DeviceStatus::Blocked
        } else {
            DeviceStatus::Unknown
        }
    }

    /// First non-empty of: whitelist label, blacklist note, vendor name,
    /// advertised name.
    fn label_for(&self, mac: &MacAddress, advertised: &str) -> LabelString {
        let label = [
            self.whitelist.label_of(mac),
            self.blacklist.label_of(mac),
            self.vendors.lookup(mac),
            Some(advertised),
        ]
        .into_iter()
        .flatten()
        .find(|l| !l.is_empty())
        .unwrap_or("");
        display_label(label)
    }

    /// Keep the log consistent with the lists once memory has changed.
    /// Storage failures still changed memory, so they refresh too.
    fn after_list_change<T>(&mut self, mac: &MacAddress, result: &Result<T, RegistryError>) {
        match result {
            Ok(_) | Err(RegistryError::Storage(_)) => self.refresh_recent(mac),
            Err(_) => {}
        }
    }

    fn refresh_recent(&mut self, mac: &MacAddress) {
        let Some(record) = self.recent.find(mac) else {
            return;
        };
        let name = record.name.clone();
        let status = self.status_of(mac);
        let label = self.label_for(mac, &name);
        self.recent.update_status(mac, status, &label);
    }

    /// Remember `mac` as alerted. False if it already was or there is no
    /// room left.
    fn raise_alert(&mut self, mac: MacAddress) -> bool {
        if self.alerts.contains(&mac) {
            return false;
        }
        match self.alerts.push(mac) {
            Ok(()) => {
                log::debug!("Alert raised for {}", mac);
                true
            }
            Err(_) => {
                log::warn!("Alert list full, not alerting on {}", mac);
                false
            }
        }
    }

    fn write_armed(&mut self) -> Result<(), RegistryError> {
        let value: &[u8] = if self.config.armed { b"1" } else { b"0" };
        match self.store.put(ARMED_KEY, value) {
            Ok(()) => {
                self.armed_dirty = false;
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to persist armed flag: {}", e);
                self.armed_dirty = true;
                Err(e.into())
            }
        }
    }
}
