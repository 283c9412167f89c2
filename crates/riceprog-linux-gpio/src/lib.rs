//! GPIO handshake backend.
//!
//! Requests the CRESET, SELECT and CDONE lines through the Linux GPIO
//! character device (`/dev/gpiochipN`), so no deprecated sysfs access and
//! no board-specific pin library. The three lines are claimed in a single
//! request with their directions fixed up front; the kernel releases them
//! when the request is dropped.

pub mod device;
pub mod error;

pub use device::{
    Handshake, HandshakeConfig, DEFAULT_CDONE, DEFAULT_CHIP, DEFAULT_CRESET, DEFAULT_SELECT,
};
pub use error::HandshakeError;
