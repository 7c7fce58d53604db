//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API so a stalled bootloader resets itself, and
//! doubles as the [`ResetPort`] the DFU engine restarts the chip through.
//!
//! The main loop feeds it while a central is actually talking to us
//! (see [`BleBootloader::poll`](crate::app::service::BleBootloader::poll)).
//! A central that goes quiet mid-update lets it expire.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

#[cfg(not(target_os = "espidf"))]
use core::cell::Cell;

use crate::app::ports::ResetPort;

/// Expiry of the task watchdog.
pub const WATCHDOG_TIMEOUT_MS: u32 = 8_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: Cell<u32>,
    #[cfg(not(target_os = "espidf"))]
    reset_requested: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!(
                        "Watchdog: subscribed ({} ms timeout, panic on trigger)",
                        WATCHDOG_TIMEOUT_MS
                    );
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): {} ms timeout", WATCHDOG_TIMEOUT_MS);
            Self {
                feeds: Cell::new(0),
                reset_requested: false,
            }
        }
    }

    /// Restart the expiry countdown.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.feeds.set(self.feeds.get() + 1);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u32 {
        self.feeds.get()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }
}

impl ResetPort for Watchdog {
    fn system_reset(&mut self) {
        info!("Watchdog: restarting");

        #[cfg(target_os = "espidf")]
        unsafe {
            esp_restart();
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.reset_requested = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_counts() {
        let wd = Watchdog::new();
        wd.feed();
        wd.feed();
        assert_eq!(wd.feeds(), 2);
        assert!(!wd.reset_requested());
    }

    #[test]
    fn system_reset_recorded() {
        let mut wd = Watchdog::default();
        wd.system_reset();
        assert!(wd.reset_requested());
    }
}
