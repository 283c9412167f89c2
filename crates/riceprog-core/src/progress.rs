//! Progress reporting seam for the transfer phase.

/// Observer for the bitstream transfer.
///
/// The CLI hangs a progress bar off this; tests pass `()`. All methods
/// default to doing nothing.
pub trait TransferProgress {
    /// The transfer is about to start; `total` is the bitstream length.
    fn begin(&mut self, _total: usize) {}

    /// `sent` bytes have been submitted so far, cumulative.
    fn advance(&mut self, _sent: usize) {}

    /// The transfer loop is done, whether it ran to the end or aborted.
    fn finish(&mut self) {}
}

/// No-op reporter.
impl TransferProgress for () {}
