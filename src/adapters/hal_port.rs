//! [`AciPort`] over embedded-hal 1.0 traits.
//!
//! | Line  | Trait        | Polarity    |
//! |-------|--------------|-------------|
//! | MOSI/MISO/SCK | `SpiBus` | LSB-first, mode 0 (configured on the bus) |
//! | REQN  | `OutputPin`  | active low  |
//! | RDYN  | `InputPin`   | active low  |
//! | RESET | `OutputPin`  | active low  |
//!
//! REQN doubles as chip select, so the port never touches a CS pin.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, InputPin, OutputPin};
use embedded_hal::spi::{Error as _, SpiBus};
use log::warn;

use crate::app::ports::{AciPort, PortError};

/// Width of the reset pulse.  The nRF8001 needs at least 200 ns.
pub const RESET_PULSE_US: u32 = 1;

pub struct HalPort<SPI, REQN, RDYN, RST, D> {
    spi: SPI,
    reqn: REQN,
    rdyn: RDYN,
    reset: RST,
    delay: D,
}

impl<SPI, REQN, RDYN, RST, D> HalPort<SPI, REQN, RDYN, RST, D>
where
    SPI: SpiBus<u8>,
    REQN: OutputPin,
    RDYN: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    /// Take the lines and park them idle: REQN and RESET high.
    pub fn new(spi: SPI, mut reqn: REQN, rdyn: RDYN, mut reset: RST, delay: D) -> Result<Self, PortError> {
        reqn.set_high().map_err(|_| PortError::Pin)?;
        reset.set_high().map_err(|_| PortError::Pin)?;
        Ok(Self {
            spi,
            reqn,
            rdyn,
            reset,
            delay,
        })
    }

    /// Give the peripherals back.
    pub fn release(self) -> (SPI, REQN, RDYN, RST, D) {
        (self.spi, self.reqn, self.rdyn, self.reset, self.delay)
    }
}

impl<SPI, REQN, RDYN, RST, D> AciPort for HalPort<SPI, REQN, RDYN, RST, D>
where
    SPI: SpiBus<u8>,
    REQN: OutputPin,
    RDYN: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn exchange(&mut self, byte: u8) -> Result<u8, PortError> {
        let mut buf = [byte];
        self.spi
            .transfer_in_place(&mut buf)
            .and_then(|()| self.spi.flush())
            .map_err(|e| {
                warn!("ACI: SPI transfer failed ({:?})", e.kind());
                PortError::Bus
            })?;
        Ok(buf[0])
    }

    fn is_ready(&mut self) -> bool {
        match self.rdyn.is_low() {
            Ok(ready) => ready,
            Err(e) => {
                warn!("ACI: RDYN read failed ({:?})", e.kind());
                false
            }
        }
    }

    fn set_request(&mut self, asserted: bool) {
        let result = if asserted {
            self.reqn.set_low()
        } else {
            self.reqn.set_high()
        };
        if let Err(e) = result {
            warn!("ACI: REQN drive failed ({:?})", e.kind());
        }
    }

    fn pulse_reset(&mut self) {
        let pulse = self
            .reset
            .set_low()
            .map(|()| self.delay.delay_us(RESET_PULSE_US))
            .and_then(|()| self.reset.set_high());
        if let Err(e) = pulse {
            warn!("ACI: reset pulse failed ({:?})", e.kind());
        }
        self.set_request(false);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
