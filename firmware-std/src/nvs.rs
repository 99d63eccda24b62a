//! NVS-backed `KvStore` for the device lists.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::{
    esp_err_t, EspError, ESP_ERR_NVS_KEY_TOO_LONG, ESP_ERR_NVS_NOT_ENOUGH_SPACE,
    ESP_ERR_NVS_VALUE_TOO_LONG,
};

use smartradar::storage::KvStore;
use smartradar::StorageError;

/// NVS namespace holding the `wlNN` / `blNN` slot records
pub const NAMESPACE: &str = "ble_radar";

pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        log::info!("NVS namespace '{}' opened", NAMESPACE);
        Ok(Self { nvs })
    }
}

impl KvStore for NvsStore {
    fn get<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, StorageError> {
        self.nvs.get_raw(key, buf).map_err(|e| map_err("get", key, e))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.nvs
            .set_raw(key, value)
            .map(|_| ())
            .map_err(|e| map_err("set", key, e))
    }

    fn erase(&mut self, key: &str) -> Result<(), StorageError> {
        // `remove` reports Ok(false) for a missing key
        self.nvs
            .remove(key)
            .map(|_| ())
            .map_err(|e| map_err("remove", key, e))
    }
}

fn map_err(op: &str, key: &str, e: EspError) -> StorageError {
    log::debug!("NVS {} '{}': {}", op, key, e);
    match e.code() {
        c if c == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t => StorageError::Full,
        c if c == ESP_ERR_NVS_KEY_TOO_LONG as esp_err_t => StorageError::KeyTooLong,
        c if c == ESP_ERR_NVS_VALUE_TOO_LONG as esp_err_t => StorageError::ValueTooLong,
        _ => StorageError::Backend,
    }
}
