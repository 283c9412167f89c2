//! CLI argument parsing

use clap::Parser;
use riceprog_linux_gpio::{DEFAULT_CDONE, DEFAULT_CHIP, DEFAULT_CRESET, DEFAULT_SELECT};
use riceprog_linux_spi::DEFAULT_DEVICE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "riceprog")]
#[command(version, about = "Lattice iCE40 slave SPI bitstream programmer")]
#[command(
    after_help = "Exit codes: 0 on success, 5 on usage errors and CDONE handshake \
                  failures, 10 on I/O and device setup errors."
)]
pub struct Cli {
    /// Bitstream file to send to the FPGA
    #[arg(value_name = "BITMAP_FILE")]
    pub bitmap: PathBuf,

    /// SPI device to use ("dummy" selects the built-in emulator)
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// GPIO character device carrying the handshake lines
    #[arg(long, default_value = DEFAULT_CHIP)]
    pub gpiochip: String,

    /// CRESET line offset (output, active low)
    #[arg(long, default_value_t = DEFAULT_CRESET)]
    pub creset: u32,

    /// SELECT line offset (output, held low while programming)
    #[arg(long, default_value_t = DEFAULT_SELECT)]
    pub select: u32,

    /// CDONE line offset (input)
    #[arg(long, default_value_t = DEFAULT_CDONE)]
    pub cdone: u32,

    /// SPI clock in kHz
    #[arg(long, default_value_t = 2000)]
    pub spispeed: u32,

    /// Abort on the first short or failed SPI transfer instead of
    /// letting CDONE decide at the end
    #[arg(long)]
    pub strict: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
