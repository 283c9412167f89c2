//! Error type for a programming attempt.

use std::io;
use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while taking the device through configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// CDONE was already high when sampled right after the reset pulse.
    ///
    /// The device did not react to CRESET, so clocking a bitstream at it
    /// would go nowhere. Usually a wiring fault on CRESET or CDONE.
    #[error("CDONE=1 after reset, device did not enter configuration mode")]
    AlreadyConfigured,

    /// CDONE stayed low after the whole bitstream was clocked out.
    #[error("no response from FPGA, CDONE still low after {sent} bitstream bytes")]
    NoResponse {
        /// Number of payload bytes that were submitted to the port.
        sent: usize,
    },

    /// A chunk moved fewer bytes than submitted. Only raised under
    /// [`TransferPolicy::Strict`](crate::sequencer::TransferPolicy).
    #[error("short SPI transfer at offset {offset}, {transferred} of {requested} bytes")]
    ShortTransfer {
        /// Byte offset of the chunk within the bitstream.
        offset: usize,
        /// Bytes the chunk carried.
        requested: usize,
        /// Bytes the driver reported as transferred.
        transferred: usize,
    },

    /// The driver rejected a chunk outright. Only raised under
    /// [`TransferPolicy::Strict`](crate::sequencer::TransferPolicy).
    #[error("SPI transfer failed at offset {offset}: {source}")]
    TransferFailed {
        /// Byte offset of the chunk within the bitstream.
        offset: usize,
        /// Underlying driver error.
        #[source]
        source: io::Error,
    },
}
