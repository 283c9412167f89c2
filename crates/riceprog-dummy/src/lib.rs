//! In-memory FPGA emulator.
//!
//! Stands in for a real iCE40 on the other end of the SPI and handshake
//! lines: CDONE drops on a CRESET pulse and rises again once enough payload
//! has been clocked in. Useful for exercising the full sequencer without
//! hardware, both from tests and from the CLI's `--device dummy` mode.
//!
//! Every interaction is recorded in an event journal so tests can assert on
//! ordering, chunk sizes and delays, not just on the final verdict.

use riceprog_core::port::{HandshakePins, SpiPort};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// One recorded interaction with the emulated device, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// CRESET was driven to this level.
    Creset(bool),
    /// SELECT was driven to this level.
    Select(bool),
    /// CDONE was sampled and read back as this level.
    CdoneSampled(bool),
    /// A transfer of this many bytes was submitted.
    Chunk(usize),
    /// A delay of this many microseconds was requested.
    DelayUs(u32),
}

/// Tunable behavior of the emulated device.
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Per-call transfer limit reported to the chunking loop.
    pub chunk_len: usize,
    /// Payload bytes needed after a reset before CDONE rises. `None` models
    /// a device that never finishes configuring.
    pub complete_after: Option<usize>,
    /// CDONE reads high even through the reset pulse, like a CRESET line
    /// that is not actually wired to the device.
    pub stuck_done: bool,
    /// Report only this many bytes transferred for the send call at this
    /// index: `(call_index, reported)`.
    pub short_chunk: Option<(usize, usize)>,
    /// Fail the send call at this index with an I/O error.
    pub fail_chunk: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            chunk_len: 4096,
            complete_after: Some(1),
            stuck_done: false,
            short_chunk: None,
            fail_chunk: None,
        }
    }
}

struct Model {
    config: DummyConfig,
    reset_seen: bool,
    creset_low_seen: bool,
    received_since_reset: usize,
    received: Vec<u8>,
    events: Vec<Event>,
    send_calls: usize,
}

impl Model {
    fn cdone_level(&self) -> bool {
        if self.config.stuck_done {
            return true;
        }
        match (self.reset_seen, self.config.complete_after) {
            (true, Some(needed)) => self.received_since_reset >= needed,
            _ => false,
        }
    }
}

/// Handle to one emulated device.
///
/// [`port`](Self::port) and [`pins`](Self::pins) hand out views over the
/// same shared state, so the handle stays usable for inspection after the
/// views have been consumed by a sequencer.
pub struct DummyFpga {
    model: Rc<RefCell<Model>>,
}

impl DummyFpga {
    /// A well-behaved device: configures after the first payload byte.
    pub fn new() -> Self {
        Self::with_config(DummyConfig::default())
    }

    /// A device with the given behavior.
    pub fn with_config(config: DummyConfig) -> Self {
        log::debug!("dummy: emulated device ready");
        Self {
            model: Rc::new(RefCell::new(Model {
                config,
                reset_seen: false,
                creset_low_seen: false,
                received_since_reset: 0,
                received: Vec::new(),
                events: Vec::new(),
                send_calls: 0,
            })),
        }
    }

    /// SPI side of the emulated device.
    pub fn port(&self) -> DummyPort {
        DummyPort {
            model: Rc::clone(&self.model),
        }
    }

    /// Handshake side of the emulated device.
    pub fn pins(&self) -> DummyPins {
        DummyPins {
            model: Rc::clone(&self.model),
        }
    }

    /// Everything that happened, in order.
    pub fn events(&self) -> Vec<Event> {
        self.model.borrow().events.clone()
    }

    /// All bytes the device accepted, payload and flush alike.
    pub fn received(&self) -> Vec<u8> {
        self.model.borrow().received.clone()
    }

    /// Submitted lengths of all send calls, in order.
    pub fn chunk_lens(&self) -> Vec<usize> {
        self.model
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Chunk(len) => Some(*len),
                _ => None,
            })
            .collect()
    }

    /// Requested delays in microseconds, in order.
    pub fn delays(&self) -> Vec<u32> {
        self.model
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::DelayUs(us) => Some(*us),
                _ => None,
            })
            .collect()
    }
}

impl Default for DummyFpga {
    fn default() -> Self {
        Self::new()
    }
}

/// SPI view of a [`DummyFpga`].
pub struct DummyPort {
    model: Rc<RefCell<Model>>,
}

impl SpiPort for DummyPort {
    fn max_chunk_len(&self) -> usize {
        self.model.borrow().config.chunk_len
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut m = self.model.borrow_mut();
        let index = m.send_calls;
        m.send_calls += 1;
        m.events.push(Event::Chunk(data.len()));

        if m.config.fail_chunk == Some(index) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "injected transfer failure",
            ));
        }

        let accepted = match m.config.short_chunk {
            Some((at, reported)) if at == index => reported.min(data.len()),
            _ => data.len(),
        };
        m.received.extend_from_slice(&data[..accepted]);
        m.received_since_reset += accepted;
        Ok(accepted)
    }

    fn delay_us(&mut self, us: u32) {
        // Recorded, never slept; tests stay instant.
        self.model.borrow_mut().events.push(Event::DelayUs(us));
    }
}

/// Handshake view of a [`DummyFpga`].
pub struct DummyPins {
    model: Rc<RefCell<Model>>,
}

impl HandshakePins for DummyPins {
    fn set_creset(&mut self, high: bool) {
        let mut m = self.model.borrow_mut();
        if high {
            if m.creset_low_seen {
                m.reset_seen = true;
            }
        } else {
            // Going into reset wipes whatever configuration was loaded.
            m.creset_low_seen = true;
            m.reset_seen = false;
            m.received_since_reset = 0;
        }
        m.events.push(Event::Creset(high));
    }

    fn set_select(&mut self, high: bool) {
        self.model.borrow_mut().events.push(Event::Select(high));
    }

    fn cdone(&self) -> bool {
        let mut m = self.model.borrow_mut();
        let level = m.cdone_level();
        m.events.push(Event::CdoneSampled(level));
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riceprog_core::error::Error;
    use riceprog_core::sequencer::{Sequencer, TransferPolicy, FLUSH_BYTES};
    use std::cell::Cell;

    fn bitstream(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_configures_a_32k_bitstream() {
        let fpga = DummyFpga::new();
        let data = bitstream(32768);

        Sequencer::new(fpga.port(), fpga.pins())
            .program(data.clone(), &mut ())
            .unwrap();

        // 8 full chunks of payload, then 8 single dummy-clock bytes.
        let mut expected = vec![4096usize; 8];
        expected.extend([1usize; FLUSH_BYTES]);
        assert_eq!(fpga.chunk_lens(), expected);

        // The device saw the exact bitstream followed by the zero flush.
        let received = fpga.received();
        assert_eq!(&received[..32768], &data[..]);
        assert_eq!(&received[32768..], &[0u8; FLUSH_BYTES]);

        assert_eq!(fpga.delays(), vec![1, 500, 500, 100]);
    }

    #[test]
    fn test_refuses_device_stuck_done_after_reset() {
        let fpga = DummyFpga::with_config(DummyConfig {
            stuck_done: true,
            ..Default::default()
        });

        let err = Sequencer::new(fpga.port(), fpga.pins())
            .program(bitstream(8192), &mut ())
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyConfigured));
        assert!(err.to_string().contains("CDONE=1 after reset"));
        // Not a single byte goes out to a device that ignored the reset.
        assert!(fpga.chunk_lens().is_empty());
        assert_eq!(fpga.delays(), vec![1, 500]);
    }

    #[test]
    fn test_reports_no_response_and_skips_flush() {
        let fpga = DummyFpga::with_config(DummyConfig {
            complete_after: None,
            ..Default::default()
        });
        let data = bitstream(10_000);

        let err = Sequencer::new(fpga.port(), fpga.pins())
            .program(data.clone(), &mut ())
            .unwrap_err();

        assert!(matches!(err, Error::NoResponse { sent: 10_000 }));
        assert!(err.to_string().contains("no response from FPGA"));
        // Payload went out in full, but no dummy-clock bytes after the
        // failed check.
        assert_eq!(fpga.received(), data);
        assert_eq!(fpga.chunk_lens(), vec![4096, 4096, 1808]);
        assert_eq!(fpga.delays(), vec![1, 500, 500]);
    }

    #[test]
    fn test_empty_bitstream_runs_the_handshake_only() {
        let fpga = DummyFpga::new();

        let err = Sequencer::new(fpga.port(), fpga.pins())
            .program(Vec::new(), &mut ())
            .unwrap_err();

        // Nothing was clocked in, so the device never configures.
        assert!(matches!(err, Error::NoResponse { sent: 0 }));
        assert!(fpga.chunk_lens().is_empty());
    }

    #[test]
    fn test_short_chunk_is_tolerated_by_default() {
        let fpga = DummyFpga::with_config(DummyConfig {
            short_chunk: Some((1, 100)),
            ..Default::default()
        });

        Sequencer::new(fpga.port(), fpga.pins())
            .program(bitstream(3 * 4096), &mut ())
            .unwrap();

        let lens = fpga.chunk_lens();
        assert_eq!(&lens[..3], &[4096, 4096, 4096]);
    }

    #[test]
    fn test_strict_policy_aborts_on_short_chunk() {
        let fpga = DummyFpga::with_config(DummyConfig {
            short_chunk: Some((1, 100)),
            ..Default::default()
        });

        let err = Sequencer::new(fpga.port(), fpga.pins())
            .with_policy(TransferPolicy::Strict)
            .program(bitstream(3 * 4096), &mut ())
            .unwrap_err();

        match err {
            Error::ShortTransfer { offset, .. } => assert_eq!(offset, 4096),
            other => panic!("unexpected error: {other:?}"),
        }
        // The abort stops the stream; nothing after the short chunk.
        assert_eq!(fpga.chunk_lens(), vec![4096, 4096]);
    }

    #[test]
    fn test_strict_policy_aborts_on_driver_error() {
        let fpga = DummyFpga::with_config(DummyConfig {
            fail_chunk: Some(0),
            ..Default::default()
        });

        let err = Sequencer::new(fpga.port(), fpga.pins())
            .with_policy(TransferPolicy::Strict)
            .program(bitstream(8192), &mut ())
            .unwrap_err();

        match err {
            Error::TransferFailed { offset, .. } => assert_eq!(offset, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reset_sequence_precedes_payload() {
        let fpga = DummyFpga::new();
        Sequencer::new(fpga.port(), fpga.pins())
            .program(bitstream(100), &mut ())
            .unwrap();

        let events = fpga.events();
        let select_low = events
            .iter()
            .position(|e| *e == Event::Select(false))
            .unwrap();
        let creset_low = events
            .iter()
            .position(|e| *e == Event::Creset(false))
            .unwrap();
        let creset_high = events
            .iter()
            .position(|e| *e == Event::Creset(true))
            .unwrap();
        let precheck = events
            .iter()
            .position(|e| matches!(e, Event::CdoneSampled(_)))
            .unwrap();
        let first_chunk = events
            .iter()
            .position(|e| matches!(e, Event::Chunk(_)))
            .unwrap();

        assert!(select_low < creset_low);
        assert!(creset_low < creset_high);
        assert!(creset_high < precheck);
        assert!(precheck < first_chunk);
        // SELECT stays low for the whole attempt.
        assert!(!events.contains(&Event::Select(true)));
    }

    #[test]
    fn test_cdone_checked_before_and_after_transfer() {
        let fpga = DummyFpga::new();
        Sequencer::new(fpga.port(), fpga.pins())
            .program(bitstream(100), &mut ())
            .unwrap();

        let samples: Vec<bool> = fpga
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::CdoneSampled(level) => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(samples, vec![false, true]);
    }

    // Wrappers that count their own drops, to pin down when the sequencer
    // lets go of the port and the pins.
    struct TrackedPort<P> {
        inner: P,
        drops: Rc<Cell<u32>>,
    }

    impl<P> Drop for TrackedPort<P> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl<P: SpiPort> SpiPort for TrackedPort<P> {
        fn max_chunk_len(&self) -> usize {
            self.inner.max_chunk_len()
        }
        fn send(&mut self, data: &[u8]) -> io::Result<usize> {
            self.inner.send(data)
        }
        fn delay_us(&mut self, us: u32) {
            self.inner.delay_us(us)
        }
    }

    struct TrackedPins<H> {
        inner: H,
        drops: Rc<Cell<u32>>,
    }

    impl<H> Drop for TrackedPins<H> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl<H: HandshakePins> HandshakePins for TrackedPins<H> {
        fn set_creset(&mut self, high: bool) {
            self.inner.set_creset(high)
        }
        fn set_select(&mut self, high: bool) {
            self.inner.set_select(high)
        }
        fn cdone(&self) -> bool {
            self.inner.cdone()
        }
    }

    #[test]
    fn test_releases_port_and_pins_once_on_every_outcome() {
        let configs = [
            DummyConfig::default(),
            DummyConfig {
                stuck_done: true,
                ..Default::default()
            },
            DummyConfig {
                complete_after: None,
                ..Default::default()
            },
        ];

        for config in configs {
            let fpga = DummyFpga::with_config(config);
            let drops = Rc::new(Cell::new(0));
            let port = TrackedPort {
                inner: fpga.port(),
                drops: Rc::clone(&drops),
            };
            let pins = TrackedPins {
                inner: fpga.pins(),
                drops: Rc::clone(&drops),
            };

            let _ = Sequencer::new(port, pins).program(bitstream(4096), &mut ());
            assert_eq!(drops.get(), 2);
        }
    }
}
