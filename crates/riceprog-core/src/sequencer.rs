//! The configuration sequencer: reset pulse, chunked bitstream transfer,
//! CDONE verdict and the trailing dummy-clock flush.

use crate::error::{Error, Result};
use crate::port::{HandshakePins, SpiPort};
use crate::progress::TransferProgress;

/// How long CRESET is held low for the device to register the reset.
pub const RESET_PULSE_US: u32 = 1;
/// Wait after releasing CRESET before the device accepts data.
pub const RESET_SETTLE_US: u32 = 500;
/// Wait after the final payload byte before CDONE is sampled.
pub const CDONE_SETTLE_US: u32 = 500;
/// Wait between the CDONE verdict and the dummy-clock flush.
pub const FLUSH_LEAD_US: u32 = 100;
/// Zero bytes clocked out one at a time once CDONE has gone high, to give
/// the device the extra clock edges it wants before starting user logic.
pub const FLUSH_BYTES: usize = 8;

/// What to do with a chunk that moves fewer bytes than submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPolicy {
    /// Log the short or failed chunk and keep streaming; CDONE decides the
    /// outcome at the end.
    #[default]
    BestEffort,
    /// Abort the attempt on the first short or failed chunk.
    Strict,
}

/// Drives one complete programming attempt against a device.
///
/// Owns the SPI port and the handshake lines for the duration of the
/// attempt; both are released when [`program`](Self::program) returns,
/// whatever the outcome.
pub struct Sequencer<P, H> {
    port: P,
    pins: H,
    policy: TransferPolicy,
}

impl<P: SpiPort, H: HandshakePins> Sequencer<P, H> {
    /// Pair a port with a set of handshake lines, best-effort policy.
    pub fn new(port: P, pins: H) -> Self {
        Self {
            port,
            pins,
            policy: TransferPolicy::BestEffort,
        }
    }

    /// Set the short-transfer policy.
    pub fn with_policy(mut self, policy: TransferPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the configuration sequence start to finish.
    ///
    /// Consumes the sequencer and the bitstream: the port, the pins and the
    /// buffer are all dropped by the time this returns, on every path.
    pub fn program(
        mut self,
        bitstream: Vec<u8>,
        progress: &mut dyn TransferProgress,
    ) -> Result<()> {
        // Hold the device in reset with SELECT low so it wakes up in slave
        // SPI configuration mode rather than booting from flash.
        self.pins.set_select(false);
        self.pins.set_creset(false);
        self.port.delay_us(RESET_PULSE_US);

        self.pins.set_creset(true);
        self.port.delay_us(RESET_SETTLE_US);

        // A high CDONE here means the reset pulse had no effect.
        if self.pins.cdone() {
            return Err(Error::AlreadyConfigured);
        }

        log::debug!("CDONE low after reset, sending {} bytes", bitstream.len());
        stream(&mut self.port, &bitstream, self.policy, progress)?;

        self.port.delay_us(CDONE_SETTLE_US);
        if !self.pins.cdone() {
            return Err(Error::NoResponse {
                sent: bitstream.len(),
            });
        }

        // The verdict is in; short counts on the flush cannot change it.
        self.port.delay_us(FLUSH_LEAD_US);
        for _ in 0..FLUSH_BYTES {
            if let Err(e) = self.port.send(&[0u8]) {
                log::warn!("dummy-clock byte not sent: {}", e);
            }
        }

        log::debug!("CDONE high, device configured");
        Ok(())
    }
}

/// Streams `data` through the port in chunks of at most
/// [`max_chunk_len`](SpiPort::max_chunk_len) bytes each.
///
/// Every byte of `data` is submitted exactly once, in order, regardless of
/// policy; under [`TransferPolicy::BestEffort`] a short or failed chunk is
/// logged and never re-sent.
pub fn stream<P: SpiPort + ?Sized>(
    port: &mut P,
    data: &[u8],
    policy: TransferPolicy,
    progress: &mut dyn TransferProgress,
) -> Result<()> {
    // A zero limit can never cover the buffer; floor it at one byte per call.
    let max_len = port.max_chunk_len().max(1);
    progress.begin(data.len());

    let mut offset = 0;
    while offset < data.len() {
        let chunk_len = std::cmp::min(max_len, data.len() - offset);
        let chunk = &data[offset..offset + chunk_len];

        match port.send(chunk) {
            Ok(n) if n >= chunk_len => {}
            Ok(n) => {
                if policy == TransferPolicy::Strict {
                    progress.finish();
                    return Err(Error::ShortTransfer {
                        offset,
                        requested: chunk_len,
                        transferred: n,
                    });
                }
                log::warn!(
                    "short SPI transfer at offset {}, {} of {} bytes",
                    offset,
                    n,
                    chunk_len
                );
            }
            Err(e) => {
                if policy == TransferPolicy::Strict {
                    progress.finish();
                    return Err(Error::TransferFailed { offset, source: e });
                }
                log::warn!("SPI transfer failed at offset {}: {}", offset, e);
            }
        }

        offset += chunk_len;
        progress.advance(offset);
    }

    progress.finish();
    Ok(())
}
