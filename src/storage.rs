/// Key-value persistence seam.
///
/// The device lists persist through [`KvStore`], which mirrors what ESP-IDF
/// NVS offers: get/put/erase on short string keys, each operation atomic for
/// its own key and nothing more. The firmware plugs NVS in; [`MemoryStore`]
/// backs host tests and simulations.
use heapless::{String, Vec};

use crate::error::StorageError;

/// Longest key accepted (ESP-IDF NVS limit, without terminator).
pub const MAX_KEY_LEN: usize = 15;

/// Largest value the lists ever write.
pub const MAX_VALUE_LEN: usize = 96;

pub type KeyString = String<MAX_KEY_LEN>;

/// Non-volatile key-value storage.
pub trait KvStore {
    /// Read the value stored under `key` into `buf`.
    ///
    /// Returns the filled prefix of `buf`, or `None` when the key is absent.
    fn get<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError>;

    /// Store `value` under `key`, replacing any previous value. Durable once
    /// this returns `Ok`.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`. Erasing an absent key is not an error.
    fn erase(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    fn get<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError> {
        (**self).get(key, buf)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn erase(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).erase(key)
    }
}

/// RAM-backed store with write accounting and fault injection.
///
/// Holds up to `N` keys. Contents survive as long as the value does, so a
/// test can drop a registry, keep the store, and rebuild to simulate a
/// reboot.
pub struct MemoryStore<const N: usize = 48> {
    entries: Vec<(KeyString, Vec<u8, MAX_VALUE_LEN>), N>,
    /// Successful `put` calls
    pub writes: usize,
    /// Successful `erase` calls
    pub erases: usize,
    /// When set, `put` and `erase` fail with [`StorageError::Backend`]
    pub fail_writes: bool,
}

impl<const N: usize> MemoryStore<N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            writes: 0,
            erases: 0,
            fail_writes: false,
        }
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.as_str() == key)
    }
}

impl<const N: usize> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> KvStore for MemoryStore<N> {
    fn get<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError> {
        let Some(i) = self.position(key) else {
            return Ok(None);
        };
        let value = &self.entries[i].1;
        let dst = buf.get_mut(..value.len()).ok_or(StorageError::ValueTooLong)?;
        dst.copy_from_slice(value);
        Ok(Some(dst))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Backend);
        }
        let key = KeyString::try_from(key).map_err(|_| StorageError::KeyTooLong)?;
        let value = Vec::from_slice(value).map_err(|_| StorageError::ValueTooLong)?;

        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self
                .entries
                .push((key, value))
                .map_err(|_| StorageError::Full)?,
        }
        self.writes += 1;
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Backend);
        }
        if let Some(i) = self.position(key) {
            self.entries.swap_remove(i);
        }
        self.erases += 1;
        Ok(())
    }
}
