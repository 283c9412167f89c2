//! Errors for the Linux SPI backend.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SpiLinkError>;

/// Errors from opening and configuring the spidev channel.
#[derive(Debug, Error)]
pub enum SpiLinkError {
    /// Failed to open the SPI device node.
    #[error("failed to open {path}: {source}")]
    OpenFailed {
        /// Path to the device node.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to set the SPI mode.
    #[error("failed to set SPI mode {mode}: {source}")]
    SetModeFailed {
        /// The mode that was requested.
        mode: u8,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to set the word size.
    #[error("failed to set {bits} bits per word: {source}")]
    SetBitsPerWordFailed {
        /// The word size that was requested.
        bits: u8,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to set the clock rate.
    #[error("failed to set SPI clock to {speed_hz} Hz: {source}")]
    SetSpeedFailed {
        /// The clock rate that was requested.
        speed_hz: u32,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configured SPI mode is out of range.
    #[error("invalid SPI mode {0}, must be 0-3")]
    InvalidMode(u8),

    /// The configured per-call transfer limit is zero.
    #[error("transfer chunk length must be at least 1 byte")]
    InvalidChunkLen,
}
