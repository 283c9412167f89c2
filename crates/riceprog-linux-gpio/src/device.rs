//! Handshake line handling.

use crate::error::{HandshakeError, Result};
use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};
use riceprog_core::port::HandshakePins;

/// Default GPIO character device.
pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";
/// Default CRESET line offset (BCM numbering on a Raspberry Pi header).
pub const DEFAULT_CRESET: Offset = 25;
/// Default SELECT line offset.
pub const DEFAULT_SELECT: Offset = 24;
/// Default CDONE line offset.
pub const DEFAULT_CDONE: Offset = 23;

/// Configuration of the three handshake lines.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// GPIO chip path, e.g. `/dev/gpiochip0`.
    pub chip: String,
    /// CRESET line offset; driven as an output, active low.
    pub creset: Offset,
    /// SELECT line offset; driven as an output, held low while programming.
    pub select: Offset,
    /// CDONE line offset; read as an input.
    pub cdone: Offset,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            chip: DEFAULT_CHIP.to_string(),
            creset: DEFAULT_CRESET,
            select: DEFAULT_SELECT,
            cdone: DEFAULT_CDONE,
        }
    }
}

impl HandshakeConfig {
    /// Configuration for `chip` with the default line offsets.
    pub fn new(chip: impl Into<String>) -> Self {
        Self {
            chip: chip.into(),
            ..Default::default()
        }
    }

    /// Set the three line offsets.
    pub fn with_lines(mut self, creset: Offset, select: Offset, cdone: Offset) -> Self {
        self.creset = creset;
        self.select = select;
        self.cdone = cdone;
        self
    }
}

/// The claimed handshake lines.
///
/// Requested once with fixed directions; the outputs come up at their idle
/// levels, CRESET high (device running) and SELECT low. The kernel releases
/// all three lines when this is dropped.
#[derive(Debug)]
pub struct Handshake {
    request: Request,
    creset: Offset,
    select: Offset,
    cdone: Offset,
}

impl Handshake {
    /// Claim the lines described by `config`.
    pub fn open(config: &HandshakeConfig) -> Result<Self> {
        if config.creset == config.select
            || config.creset == config.cdone
            || config.select == config.cdone
        {
            return Err(HandshakeError::DuplicateLines);
        }

        log::debug!(
            "gpio: requesting creset={} select={} cdone={} on {}",
            config.creset,
            config.select,
            config.cdone,
            config.chip
        );

        let mut req_config = Config::default();
        req_config.with_line(config.creset).as_output(Value::Active);
        req_config
            .with_line(config.select)
            .as_output(Value::Inactive);
        req_config.with_line(config.cdone).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.chip)
            .with_consumer("riceprog")
            .request()
            .map_err(HandshakeError::LineRequestFailed)?;

        log::info!(
            "gpio: {} creset={} select={} cdone={}",
            config.chip,
            config.creset,
            config.select,
            config.cdone
        );

        Ok(Self {
            request,
            creset: config.creset,
            select: config.select,
            cdone: config.cdone,
        })
    }

    /// Release the lines. Dropping the handshake does the same.
    pub fn close(self) {}

    fn drive(&mut self, name: &str, offset: Offset, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };
        if let Err(e) = self.request.set_value(offset, value) {
            log::error!("gpio: failed to drive {}: {}", name, e);
        }
    }
}

impl HandshakePins for Handshake {
    fn set_creset(&mut self, high: bool) {
        self.drive("CRESET", self.creset, high);
    }

    fn set_select(&mut self, high: bool) {
        self.drive("SELECT", self.select, high);
    }

    fn cdone(&self) -> bool {
        match self.request.value(self.cdone) {
            Ok(value) => value == Value::Active,
            Err(e) => {
                log::error!("gpio: failed to read CDONE: {}", e);
                false
            }
        }
    }
}
