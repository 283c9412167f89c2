//! Errors for the GPIO handshake backend.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, HandshakeError>;

/// Errors from claiming the handshake lines.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The kernel refused the line request.
    #[error("failed to request GPIO lines: {0}")]
    LineRequestFailed(#[source] gpiocdev::Error),

    /// Two of the configured lines share an offset.
    #[error("CRESET, SELECT and CDONE must be three distinct line offsets")]
    DuplicateLines,
}
