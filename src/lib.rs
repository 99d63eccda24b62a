//! SmartRadar library: BLE presence radar core.
//!
//! Resolves device vendors from a compiled-in OUI table, keeps a rolling log
//! of recently seen BLE devices, and maintains user-curated whitelist and
//! blacklist entries that survive reboots through a key-value store. The
//! crate is `no_std` with no allocator and testable on any host with
//! `cargo test`; the ESP32 firmware in `firmware-std` supplies the radio,
//! NVS and the BLE command service.
//!
//! - `mac`, `oui`, `vendors`: address parsing and vendor lookup
//! - `recent`, `list`, `registry`: detection log, persistent lists and the
//!   component that owns them
//! - `storage`: the `KvStore` persistence seam and an in-memory store
//! - `protocol`, `comm`: NDJSON command protocol
//! - `board`: compile-time board constants

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod comm;
pub mod error;
pub mod label;
pub mod list;
pub mod mac;
pub mod oui;
pub mod protocol;
pub mod recent;
pub mod registry;
pub mod storage;
pub mod vendors;

pub use error::{RegistryError, StorageError};
pub use mac::MacAddress;
pub use registry::{create, DetectionEvent, DeviceRegistry, RegistryConfig, Sighting};
