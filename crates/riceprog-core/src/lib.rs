//! riceprog-core - configuration sequencing for iCE40 slave SPI programming
//!
//! This crate holds the protocol logic only: the reset / check / transfer /
//! flush sequence that takes a Lattice iCE40 from reset to a configured
//! device, expressed over two small trait seams. Opening real hardware lives
//! in the backend crates (`riceprog-linux-spi`, `riceprog-linux-gpio`); an
//! in-memory stand-in lives in `riceprog-dummy`.
//!
//! # Example
//!
//! ```ignore
//! use riceprog_core::sequencer::Sequencer;
//!
//! let seq = Sequencer::new(port, pins);
//! seq.program(bitstream, &mut ())?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod port;
pub mod progress;
pub mod sequencer;

pub use error::{Error, Result};
