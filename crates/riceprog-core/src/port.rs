//! Trait seams between the sequencer and the hardware backends.

use std::io;

/// Host side of the configuration SPI channel.
///
/// The channel is write-only: the device answers over CDONE, never over
/// MISO, so nothing is ever read back here.
pub trait SpiPort {
    /// Largest number of bytes a single [`send`](Self::send) call may carry.
    ///
    /// The transfer loop never submits more than this per call and treats a
    /// reported limit of 0 as 1; the limit comes from the driver's
    /// per-message buffer.
    fn max_chunk_len(&self) -> usize;

    /// Clock `data` out on the bus in one driver transaction.
    ///
    /// Returns the number of bytes the driver reports as transferred, which
    /// may be less than `data.len()`. An `Err` means the driver rejected the
    /// whole call.
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Block for the given number of microseconds.
    fn delay_us(&mut self, us: u32);
}

/// The three handshake lines of the target device.
///
/// Direction binding happens when the implementation is constructed, so
/// these operations never fail at this layer. Backends log a driver error
/// and carry on; a failed CDONE read samples as low.
pub trait HandshakePins {
    /// Drive the CRESET line. Active low: driving it low resets the device.
    fn set_creset(&mut self, high: bool);

    /// Drive the SELECT line. Held low across the whole attempt so the
    /// device wakes up in slave configuration mode.
    fn set_select(&mut self, high: bool);

    /// Sample the CDONE line. High means the device holds a complete
    /// configuration.
    fn cdone(&self) -> bool;
}
