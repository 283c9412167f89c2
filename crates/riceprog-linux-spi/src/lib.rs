//! Linux spidev backend.
//!
//! Talks to the kernel SPI driver through `/dev/spidevB.C` using the spidev
//! ioctl interface directly, so the only requirements are a kernel with
//! spidev bound to the right chip select and permission to open the device
//! node. The channel is configured once at open (mode, word size, clock)
//! and every [`send`](riceprog_core::port::SpiPort::send) maps to a single
//! `SPI_IOC_MESSAGE(1)` full-duplex transfer with the receive side left
//! unwired.
//!
//! ```ignore
//! use riceprog_linux_spi::{SpiLink, SpiLinkConfig};
//!
//! let link = SpiLink::open(&SpiLinkConfig::new("/dev/spidev0.0"))?;
//! ```

pub mod device;
pub mod error;

pub use device::{SpiLink, SpiLinkConfig, DEFAULT_DEVICE};
pub use error::SpiLinkError;
