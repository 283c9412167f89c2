//! One programming run: load the bitstream, open the backends, hand
//! everything to the sequencer and map the outcome to an exit status.

use crate::cli::Cli;
use indicatif::{ProgressBar, ProgressStyle};
use riceprog_core::error::Error as ProtocolError;
use riceprog_core::port::{HandshakePins, SpiPort};
use riceprog_core::progress::TransferProgress;
use riceprog_core::sequencer::{Sequencer, TransferPolicy};
use riceprog_linux_gpio::{Handshake, HandshakeConfig};
use riceprog_linux_spi::{SpiLink, SpiLinkConfig};
use std::fs;
use thiserror::Error;

/// Exit status for usage errors and CDONE handshake failures.
pub const EXIT_USAGE: i32 = 5;
/// Exit status for I/O and device setup errors.
pub const EXIT_IO: i32 = 10;

/// Anything that ends a run without a configured device.
#[derive(Debug, Error)]
pub enum Failure {
    /// The bitstream file could not be read.
    #[error("cannot read {path}: {source}")]
    BitstreamRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The SPI channel could not be opened or configured.
    #[error(transparent)]
    SpiSetup(#[from] riceprog_linux_spi::SpiLinkError),

    /// The handshake lines could not be claimed.
    #[error(transparent)]
    GpioSetup(#[from] riceprog_linux_gpio::HandshakeError),

    /// The device rejected the attempt or the transfer broke down.
    #[error("error writing to FPGA: {0}")]
    Protocol(#[from] ProtocolError),
}

impl Failure {
    /// Exit status for this failure. CDONE verdicts are handshake failures
    /// (5); everything else kept the attempt from running cleanly (10).
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::Protocol(ProtocolError::AlreadyConfigured)
            | Failure::Protocol(ProtocolError::NoResponse { .. }) => EXIT_USAGE,
            _ => EXIT_IO,
        }
    }
}

/// Run one programming attempt as described by the command line.
pub fn run(cli: &Cli) -> Result<(), Failure> {
    let bitstream = fs::read(&cli.bitmap).map_err(|e| Failure::BitstreamRead {
        path: cli.bitmap.display().to_string(),
        source: e,
    })?;
    log::info!(
        "read {} bytes from {}",
        bitstream.len(),
        cli.bitmap.display()
    );

    let policy = if cli.strict {
        TransferPolicy::Strict
    } else {
        TransferPolicy::BestEffort
    };

    #[cfg(feature = "dummy")]
    if cli.device == "dummy" {
        let fpga = riceprog_dummy::DummyFpga::new();
        return attempt(fpga.port(), fpga.pins(), bitstream, policy);
    }

    let port =
        SpiLink::open(&SpiLinkConfig::new(&cli.device).with_speed(spi_speed_hz(cli.spispeed)))?;
    let pins = Handshake::open(
        &HandshakeConfig::new(&cli.gpiochip).with_lines(cli.creset, cli.select, cli.cdone),
    )?;

    attempt(port, pins, bitstream, policy)
}

/// Command-line kHz to driver Hz, pinned at `u32::MAX` instead of wrapping.
fn spi_speed_hz(khz: u32) -> u32 {
    khz.saturating_mul(1000)
}

fn attempt<P: SpiPort, H: HandshakePins>(
    port: P,
    pins: H,
    bitstream: Vec<u8>,
    policy: TransferPolicy,
) -> Result<(), Failure> {
    let mut progress = TransferBar::new();
    Sequencer::new(port, pins)
        .with_policy(policy)
        .program(bitstream, &mut progress)?;
    log::info!("FPGA configured");
    Ok(())
}

/// Progress bar over the transfer phase.
struct TransferBar {
    bar: Option<ProgressBar>,
}

impl TransferBar {
    fn new() -> Self {
        Self { bar: None }
    }
}

impl TransferProgress for TransferBar {
    fn begin(&mut self, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) Sending")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.bar = Some(pb);
    }

    fn advance(&mut self, sent: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(sent as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}
