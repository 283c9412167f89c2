//! riceprog - Lattice iCE40 slave SPI bitstream programmer
//!
//! Streams a bitstream file to an iCE40 over a spidev channel while driving
//! the CRESET / SELECT / CDONE handshake lines through the Linux GPIO
//! character device. The device itself reports success: CDONE high after
//! the transfer means the configuration took.
//!
//! # Architecture
//!
//! The protocol lives in `riceprog-core` behind two small traits, one for
//! the SPI channel and one for the handshake lines. This binary decides
//! which backend implements them: the real spidev/gpiochip pair, or the
//! in-memory emulator from `riceprog-dummy` when `--device dummy` is given.

mod cli;
mod program;

use clap::Parser;
use cli::Cli;
use std::process;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Covers -h/--version and bad usage alike; clap already
            // formatted the message.
            let _ = e.print();
            process::exit(program::EXIT_USAGE);
        }
    };

    // Default to info; -v raises it. RUST_LOG still wins when set.
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // All resources live inside `run`: by the time it returns, the SPI
    // handle, the GPIO request and the bitstream buffer are gone, so
    // exiting here never skips a teardown.
    if let Err(failure) = program::run(&cli) {
        eprintln!("riceprog: {}", failure);
        process::exit(failure.exit_code());
    }
}
