use thiserror::Error;

/// Failures reported by a [`KvStore`](crate::storage::KvStore) backend.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The backend reported an I/O or driver failure.
    #[error("storage backend failure")]
    Backend,

    /// The backend has no room for another key.
    #[error("storage full")]
    Full,

    /// The value does not fit the backend or the caller's read buffer.
    #[error("value too long")]
    ValueTooLong,

    /// The key exceeds the backend's limit (15 bytes for ESP-IDF NVS).
    #[error("key too long")]
    KeyTooLong,
}

/// Errors surfaced by the device lists and the registry.
///
/// Lookups never fail: unknown prefixes, MACs and indices produce empty
/// sentinels instead. Only mutations return these.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid MAC address")]
    InvalidMac,

    #[error("MAC already listed")]
    Duplicate,

    #[error("list is full")]
    Full,

    #[error("MAC not listed")]
    NotFound,

    /// The in-memory change was applied but could not be persisted.
    #[error("persistence failed: {0}")]
    Storage(#[from] StorageError),
}

impl RegistryError {
    /// Short machine-readable code used in protocol replies.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::InvalidMac => "invalid_mac",
            RegistryError::Duplicate => "duplicate",
            RegistryError::Full => "full",
            RegistryError::NotFound => "not_found",
            RegistryError::Storage(_) => "storage",
        }
    }
}

impl From<crate::mac::InvalidMac> for RegistryError {
    fn from(_: crate::mac::InvalidMac) -> Self {
        RegistryError::InvalidMac
    }
}
