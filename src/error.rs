//! Unified error type for the bootloader.
//!
//! Link-level operations keep boolean results where the caller decides
//! whether to retry; everything that carries a reason funnels into this
//! `Copy` enum so the poll loop and the binary entry point handle errors
//! one way.

use core::fmt;

use crate::aci::CodecError;
use crate::app::ports::{ConfigError, FlashError, PortError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// SPI or GPIO failure on the ACI port.
    Port(PortError),
    /// A frame could not be encoded or decoded.
    Codec(CodecError),
    /// Program memory could not be written.
    Flash(FlashError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(e) => write!(f, "port: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
