//! [`FlashPort`] over the inactive OTA partition, backed by `esp-ota`.
//!
//! The DFU engine hands over pages in address order starting at zero, which
//! is exactly the sequential write stream `esp_ota::OtaUpdate` wants.  The
//! page at address 0 opens a fresh update; any gap or rewind is refused.
//! [`commit`](FlashPort::commit) verifies the image and makes it the boot
//! partition.

use log::{info, warn};

use crate::app::ports::{FlashError, FlashPort};

pub struct OtaFlash {
    capacity: u32,
    next_address: u32,
    update: Option<esp_ota::OtaUpdate>,
}

impl OtaFlash {
    /// `capacity` is the size of the OTA slot the image must fit in.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next_address: 0,
            update: None,
        }
    }
}

impl FlashPort for OtaFlash {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn program_page(&mut self, address: u32, page: &[u8]) -> Result<(), FlashError> {
        if address == 0 {
            // Dropping a previous update aborts it.
            self.update = None;
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                FlashError::EraseFailed
            })?;
            self.update = Some(update);
            self.next_address = 0;
            info!("OTA: partition opened");
        }

        if address != self.next_address {
            warn!(
                "OTA: non-sequential page 0x{:06X} (expected 0x{:06X})",
                address, self.next_address
            );
            return Err(FlashError::OutOfRange);
        }
        let end = address
            .checked_add(page.len() as u32)
            .filter(|&end| end <= self.capacity)
            .ok_or(FlashError::OutOfRange)?;

        let update = self.update.as_mut().ok_or(FlashError::WriteFailed)?;
        update.write(page).map_err(|e| {
            warn!("esp-ota write failed: {:?}", e);
            FlashError::WriteFailed
        })?;
        self.next_address = end;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FlashError> {
        let update = self.update.take().ok_or(FlashError::CommitFailed)?;
        let mut completed = update.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            FlashError::CommitFailed
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            FlashError::CommitFailed
        })?;
        info!("OTA: {} bytes committed, boot partition switched", self.next_address);
        self.next_address = 0;
        Ok(())
    }
}

/// Mark the running firmware valid so the rollback logic keeps it.
pub fn mark_running_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running firmware marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}
