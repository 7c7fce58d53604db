//! Firmware image accumulation.
//!
//! Incoming bytes fill a page-sized buffer; each full page is handed to
//! the programmer exactly once and the write address advances by one
//! page.  The trailing partial page is padded with the erased-flash value
//! before it is written.

/// Value of an erased flash byte, used to pad the last page.
pub const ERASED: u8 = 0xFF;

/// Progress of one firmware transfer.
#[derive(Debug, Clone)]
pub struct DfuSession<const PAGE: usize> {
    image_len: u32,
    received: u32,
    page_address: u32,
    page: [u8; PAGE],
    page_index: usize,
    pages_written: u32,
    packets: u16,
    notify_interval: u16,
}

impl<const PAGE: usize> DfuSession<PAGE> {
    pub const fn new(notify_interval: u16) -> Self {
        const { assert!(PAGE > 0, "page size must be non-zero") };
        Self {
            image_len: 0,
            received: 0,
            page_address: 0,
            page: [ERASED; PAGE],
            page_index: 0,
            pages_written: 0,
            packets: 0,
            notify_interval,
        }
    }

    /// Arm for an image of `image_len` bytes written from address 0.
    pub fn begin(&mut self, image_len: u32) {
        *self = Self::new(self.notify_interval);
        self.image_len = image_len;
    }

    pub fn image_len(&self) -> u32 {
        self.image_len
    }

    pub fn bytes_received(&self) -> u32 {
        self.received
    }

    pub fn remaining(&self) -> u32 {
        self.image_len - self.received
    }

    /// Every byte of the announced image has arrived.
    pub fn is_complete(&self) -> bool {
        self.received == self.image_len
    }

    /// Address the next full page will be written to.
    pub fn page_address(&self) -> u32 {
        self.page_address
    }

    /// Bytes waiting in the page buffer.
    pub fn buffered(&self) -> usize {
        self.page_index
    }

    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    pub fn packets_received(&self) -> u16 {
        self.packets
    }

    pub fn notify_interval(&self) -> u16 {
        self.notify_interval
    }

    /// Change the receipt interval and restart the packet count.
    pub fn set_notify_interval(&mut self, interval: u16) {
        self.notify_interval = interval;
        self.packets = 0;
    }

    /// Count one data packet.  Returns `true` when a receipt is due.
    pub fn count_packet(&mut self) -> bool {
        self.packets = self.packets.wrapping_add(1);
        self.notify_interval != 0 && self.packets % self.notify_interval == 0
    }

    /// Buffer `data`, programming every page it completes.
    ///
    /// The caller trims `data` to [`remaining`](Self::remaining).  On a
    /// programming error the bytes up to and including the failed page are
    /// counted as received.
    pub fn absorb<E>(
        &mut self,
        data: &[u8],
        mut program: impl FnMut(u32, &[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut rest = data;
        while !rest.is_empty() {
            let take = rest.len().min(PAGE - self.page_index);
            self.page[self.page_index..self.page_index + take].copy_from_slice(&rest[..take]);
            self.page_index += take;
            self.received += take as u32;
            rest = &rest[take..];

            if self.page_index == PAGE {
                self.write_page(&mut program)?;
            }
        }
        Ok(())
    }

    /// Pad and program the trailing partial page, if any.
    pub fn finish<E>(
        &mut self,
        mut program: impl FnMut(u32, &[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.page_index == 0 {
            return Ok(());
        }
        self.page[self.page_index..].fill(ERASED);
        self.write_page(&mut program)
    }

    fn write_page<E>(
        &mut self,
        program: &mut impl FnMut(u32, &[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        program(self.page_address, &self.page)?;
        self.page_address += PAGE as u32;
        self.page_index = 0;
        self.pages_written += 1;
        Ok(())
    }
}
