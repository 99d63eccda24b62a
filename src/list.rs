/// Persistent, slot-indexed device lists (whitelist and blacklist).
///
/// The edit layer addresses entries by slot index, so slots never move:
/// removing an entry leaves a hole that the next `add` fills. Each slot is
/// persisted under its own key (`wl00`..`wl19`) as a small JSON record, so
/// a mutation writes exactly one key and a power cut can lose at most the
/// mutation in flight.
///
/// Every mutation writes through before returning `Ok`. When the write
/// fails the in-memory change stands, the slot is marked dirty for
/// [`ListStore::flush`], and the caller gets [`RegistryError::Storage`].
use core::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, StorageError};
use crate::label::{render_line, sanitize_label, LabelString, LineString};
use crate::mac::{MacAddress, MacString};
use crate::storage::{KeyString, KvStore, MAX_VALUE_LEN};

/// Whitelist slot count (the edit UI shows 20 rows).
pub const WHITELIST_CAPACITY: usize = 20;

/// Blacklist slot count.
pub const BLACKLIST_CAPACITY: usize = 20;

/// Key prefix for whitelist slots.
pub const WHITELIST_KEY_PREFIX: &str = "wl";

/// Key prefix for blacklist slots.
pub const BLACKLIST_KEY_PREFIX: &str = "bl";

/// An occupied slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub mac: MacAddress,
    pub label: LabelString,
}

/// On-flash form of one slot.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    mac: MacString,
    label: LabelString,
}

pub struct ListStore<const N: usize> {
    key_prefix: &'static str,
    slots: [Option<ListEntry>; N],
    /// Slots whose last write failed
    dirty: [bool; N],
}

pub type WhitelistStore = ListStore<WHITELIST_CAPACITY>;
pub type BlacklistStore = ListStore<BLACKLIST_CAPACITY>;

impl<const N: usize> ListStore<N> {
    /// An empty list persisting under `key_prefix` (at most 13 bytes so the
    /// two-digit slot suffix fits an NVS key).
    pub fn new(key_prefix: &'static str) -> Self {
        Self {
            key_prefix,
            slots: core::array::from_fn(|_| None),
            dirty: [false; N],
        }
    }

    pub fn whitelist() -> Self {
        Self::new(WHITELIST_KEY_PREFIX)
    }

    pub fn blacklist() -> Self {
        Self::new(BLACKLIST_KEY_PREFIX)
    }

    /// Rebuild the slot array from storage, discarding in-memory contents.
    ///
    /// Missing keys are empty slots. Unreadable or corrupt records are
    /// logged and left empty; a MAC already loaded into an earlier slot is
    /// dropped. Returns the number of entries loaded.
    pub fn load<S: KvStore>(&mut self, store: &S) -> usize {
        let mut buf = [0u8; MAX_VALUE_LEN];
        let mut loaded = 0;

        for i in 0..N {
            self.slots[i] = None;
            self.dirty[i] = false;

            let key = self.slot_key(i);
            let bytes = match store.get(&key, &mut buf) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Reading {} failed: {}", key, e);
                    continue;
                }
            };

            let Some(entry) = decode_entry(bytes) else {
                log::warn!("Skipping corrupt record {}", key);
                continue;
            };

            if self.find(&entry.mac).is_some() {
                log::warn!("Skipping {}: {} already listed", key, entry.mac);
                continue;
            }

            self.slots[i] = Some(entry);
            loaded += 1;
        }

        log::debug!("Loaded {} {} entries", loaded, self.key_prefix);
        loaded
    }

    /// Put `mac` in the first empty slot and return that slot.
    ///
    /// Fails with `Duplicate` if the MAC is already listed (use
    /// [`set_label`](Self::set_label) instead) or `Full` if no slot is free;
    /// neither touches any slot.
    pub fn add<S: KvStore>(
        &mut self,
        store: &mut S,
        mac: MacAddress,
        label: &str,
    ) -> Result<usize, RegistryError> {
        if self.find(&mac).is_some() {
            return Err(RegistryError::Duplicate);
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryError::Full)?;

        self.slots[slot] = Some(ListEntry {
            mac,
            label: sanitize_label(label),
        });
        log::info!("{}[{}] <- {}", self.key_prefix, slot, mac);
        self.commit(store, slot)?;
        Ok(slot)
    }

    /// Empty the slot holding `mac`, leaving a hole. Returns the slot.
    pub fn remove<S: KvStore>(
        &mut self,
        store: &mut S,
        mac: &MacAddress,
    ) -> Result<usize, RegistryError> {
        let slot = self.find(mac).ok_or(RegistryError::NotFound)?;
        self.slots[slot] = None;
        log::info!("{}[{}] removed {}", self.key_prefix, slot, mac);
        self.commit(store, slot)?;
        Ok(slot)
    }

    /// Replace the label of `mac`.
    ///
    /// An unchanged label issues no write unless the slot still has a
    /// failed write pending.
    pub fn set_label<S: KvStore>(
        &mut self,
        store: &mut S,
        mac: &MacAddress,
        label: &str,
    ) -> Result<(), RegistryError> {
        let slot = self.find(mac).ok_or(RegistryError::NotFound)?;
        let label = sanitize_label(label);

        if let Some(entry) = self.slots[slot].as_mut() {
            if entry.label == label && !self.dirty[slot] {
                return Ok(());
            }
            entry.label = label;
        }
        self.commit(store, slot)
    }

    /// Empty every slot. Stops reporting at the first failed erase but
    /// still clears memory and marks the failed slots dirty.
    pub fn clear<S: KvStore>(&mut self, store: &mut S) -> Result<(), RegistryError> {
        let mut result = Ok(());
        for slot in 0..N {
            if self.slots[slot].take().is_some() || self.dirty[slot] {
                if let Err(e) = self.commit(store, slot) {
                    result = result.and(Err(e));
                }
            }
        }
        log::info!("{} cleared", self.key_prefix);
        result
    }

    /// Retry every slot whose last write failed. Returns how many were
    /// written; the first error aborts the pass.
    pub fn flush<S: KvStore>(&mut self, store: &mut S) -> Result<usize, RegistryError> {
        let mut written = 0;
        for slot in 0..N {
            if self.dirty[slot] {
                self.commit(store, slot)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Whether any slot has a failed write pending.
    pub fn has_pending_writes(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    pub fn get(&self, index: usize) -> Option<&ListEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// MAC in slot `index`, or an empty string for a hole or bad index.
    pub fn get_mac(&self, index: usize) -> MacString {
        self.get(index)
            .map(|e| e.mac.to_mac_string())
            .unwrap_or_default()
    }

    /// Label in slot `index`, or an empty string for a hole or bad index.
    pub fn get_label(&self, index: usize) -> LabelString {
        self.get(index).map(|e| e.label.clone()).unwrap_or_default()
    }

    /// `"<MAC> | <label>"` for slot `index`, or an empty string.
    pub fn line(&self, index: usize) -> LineString {
        self.get(index)
            .map(|e| render_line(&e.mac, &e.label))
            .unwrap_or_default()
    }

    pub fn find(&self, mac: &MacAddress) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.mac == *mac))
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.find(mac).is_some()
    }

    pub fn label_of(&self, mac: &MacAddress) -> Option<&str> {
        self.find(mac)
            .and_then(|i| self.slots[i].as_ref())
            .map(|e| e.label.as_str())
    }

    /// Occupied slot count.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Occupied slots with their indices, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ListEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
    }

    /// Write every entry as a line, newline-separated, or `-` when empty.
    pub fn write_display<W: Write>(&self, out: &mut W) -> fmt::Result {
        let mut first = true;
        for (_, entry) in self.iter() {
            if !first {
                out.write_char('\n')?;
            }
            out.write_str(&render_line(&entry.mac, &entry.label))?;
            first = false;
        }
        if first {
            out.write_char('-')?;
        }
        Ok(())
    }

    fn slot_key(&self, slot: usize) -> KeyString {
        let mut key = KeyString::new();
        let _ = write!(key, "{}{:02}", self.key_prefix, slot);
        key
    }

    /// Persist one slot and keep its dirty flag in step with the outcome.
    fn commit<S: KvStore>(&mut self, store: &mut S, slot: usize) -> Result<(), RegistryError> {
        let key = self.slot_key(slot);
        let result = match &self.slots[slot] {
            Some(entry) => {
                let mut buf = [0u8; MAX_VALUE_LEN];
                encode_entry(entry, &mut buf).and_then(|len| store.put(&key, &buf[..len]))
            }
            None => store.erase(&key),
        };

        match result {
            Ok(()) => {
                self.dirty[slot] = false;
                Ok(())
            }
            Err(e) => {
                self.dirty[slot] = true;
                log::warn!("Persisting {} failed: {}", key, e);
                Err(e.into())
            }
        }
    }
}

fn encode_entry(entry: &ListEntry, buf: &mut [u8]) -> Result<usize, StorageError> {
    let stored = StoredEntry {
        mac: entry.mac.to_mac_string(),
        label: entry.label.clone(),
    };
    serde_json_core::to_slice(&stored, buf).map_err(|_| StorageError::ValueTooLong)
}

fn decode_entry(bytes: &[u8]) -> Option<ListEntry> {
    let (stored, _) = serde_json_core::from_slice::<StoredEntry>(bytes).ok()?;
    let mac = MacAddress::parse(&stored.mac).ok()?;
    Some(ListEntry {
        mac,
        label: sanitize_label(&stored.label),
    })
}
