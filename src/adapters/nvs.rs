//! NVS (Non-Volatile Storage) config store.
//!
//! Implements [`ConfigPort`] for [`BootConfig`], stored as one postcard
//! blob.  On the board it lives in the `bledfu` NVS namespace; host builds
//! use an in-memory map so the same code paths run under test.
//!
//! The application that jumps into the bootloader may hand over the legacy
//! EEPROM block instead; [`NvsConfigStore::import_eeprom`] parses and
//! persists it.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::BootConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"bledfu\0";
const CONFIG_KEY: &str = "bootcfg";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsConfigStore {
    /// Initialise NVS flash.  A partition that is full or from a newer
    /// IDF version is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfigStore: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Parse the EEPROM block the application left behind and persist it.
    pub fn import_eeprom(&self, block: &[u8]) -> Result<BootConfig, ConfigError> {
        let cfg = BootConfig::from_eeprom(block)?;
        self.save(&cfg)?;
        info!("NvsConfigStore: imported EEPROM block");
        Ok(cfg)
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key() -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..CONFIG_KEY.len()].copy_from_slice(CONFIG_KEY.as_bytes());
        buf
    }
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<BootConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(CONFIG_KEY) {
                Some(bytes) => {
                    let cfg: BootConfig =
                        postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                    info!("NvsConfigStore: loaded config from store");
                    Ok(cfg)
                }
                None => {
                    info!("NvsConfigStore: no stored config, using defaults");
                    Ok(BootConfig::default())
                }
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let key = Self::key();
                let mut buf = [0u8; MAX_BLOB_SIZE];
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok((buf, size))
            });

            match result {
                Ok((buf, size)) => {
                    let cfg: BootConfig =
                        postcard::from_bytes(&buf[..size]).map_err(|_| ConfigError::Corrupted)?;
                    info!("NvsConfigStore: loaded config from NVS ({} bytes)", size);
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsConfigStore: no stored config, using defaults");
                    Ok(BootConfig::default())
                }
                Err(e) => {
                    warn!("NvsConfigStore: NVS read error {}, using defaults", e);
                    Ok(BootConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &BootConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().insert(CONFIG_KEY.into(), bytes);
            info!("NvsConfigStore: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let key = Self::key();
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsConfigStore: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsConfigStore: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DfuPipes;

    #[test]
    fn load_without_save_gives_defaults() {
        let nvs = NvsConfigStore::new().unwrap();
        assert_eq!(nvs.load().unwrap(), BootConfig::default());
    }

    #[test]
    fn save_then_load() {
        let nvs = NvsConfigStore::new().unwrap();
        let cfg = BootConfig {
            valid: true,
            credit_total: 3,
            pipes: DfuPipes {
                packet_rx: 12,
                control_tx: 13,
                control_rx: 14,
            },
            notify_interval: 10,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn save_rejects_invalid_config() {
        let nvs = NvsConfigStore::new().unwrap();
        let cfg = BootConfig {
            credit_total: 0,
            ..Default::default()
        };
        assert!(matches!(
            nvs.save(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert_eq!(nvs.load().unwrap(), BootConfig::default());
    }

    #[test]
    fn corrupted_blob_reported() {
        let nvs = NvsConfigStore::new().unwrap();
        nvs.store
            .borrow_mut()
            .insert(CONFIG_KEY.into(), vec![0xFF; 3]);
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn import_rejects_unprovisioned_block() {
        let nvs = NvsConfigStore::new().unwrap();
        assert_eq!(nvs.import_eeprom(&[0xFF; 22]), Err(ConfigError::NotFound));
    }
}
