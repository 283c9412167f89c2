//! spidev device handling.

use crate::error::{Result, SpiLinkError};
use riceprog_core::port::SpiPort;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::thread;
use std::time::Duration;

/// Default SPI device node.
pub const DEFAULT_DEVICE: &str = "/dev/spidev0.0";
/// Default SPI clock, 2 MHz.
const DEFAULT_SPEED_HZ: u32 = 2_000_000;
/// Default per-call transfer limit; spidev's stock `bufsiz` is 4096.
const DEFAULT_CHUNK_LEN: usize = 4096;
/// The device takes its configuration as plain bytes.
const BITS_PER_WORD: u8 = 8;

/// Kernel parameter holding the spidev per-message buffer size.
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Read the kernel's per-message buffer size, if exposed.
fn kernel_buf_size() -> Option<usize> {
    let content = std::fs::read_to_string(BUF_SIZE_SYSFS).ok()?;
    content.trim().parse::<usize>().ok().filter(|&size| size > 0)
}

/// SPI mode numbers as CPOL/CPHA pairs.
pub mod mode {
    /// CPOL=0, CPHA=0.
    pub const MODE_0: u8 = 0;
    /// CPOL=0, CPHA=1.
    pub const MODE_1: u8 = 1;
    /// CPOL=1, CPHA=0.
    pub const MODE_2: u8 = 2;
    /// CPOL=1, CPHA=1: clock idles high, data latched on the rising edge.
    /// This is what the iCE40 slave configuration port expects.
    pub const MODE_3: u8 = 3;
}

mod ioctl {
    use nix::ioctl_write_ptr;

    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of the kernel's `struct spi_ioc_transfer` on 64-bit targets.
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Request number for `SPI_IOC_MESSAGE(n)`.
    ///
    /// `_IOW('k', 0, struct spi_ioc_transfer[n])`: write direction (1) in
    /// bits 30-31, payload size in bits 16-29, magic in bits 8-15, number 0
    /// in bits 0-7.
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as u32) * SPI_IOC_TRANSFER_SIZE as u32;
        ((1u32 << 30) | (size << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// Mirror of the kernel's `struct spi_ioc_transfer`.
#[repr(C)]
#[derive(Debug)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// Configuration for opening the SPI channel.
///
/// Plain data handed to [`SpiLink::open`]; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct SpiLinkConfig {
    /// Device node path, e.g. `/dev/spidev0.0`.
    pub device: String,
    /// Clock rate in Hz.
    pub speed_hz: u32,
    /// SPI mode, 0-3.
    pub mode: u8,
    /// Delay carried in each transfer message, in microseconds.
    pub delay_usecs: u16,
    /// Per-call transfer limit in bytes.
    pub chunk_len: usize,
}

impl Default for SpiLinkConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_3,
            delay_usecs: 0,
            chunk_len: DEFAULT_CHUNK_LEN,
        }
    }
}

impl SpiLinkConfig {
    /// Configuration for `device` with default settings.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the clock rate in Hz.
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode.
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Set the per-message delay in microseconds.
    pub fn with_delay(mut self, delay_usecs: u16) -> Self {
        self.delay_usecs = delay_usecs;
        self
    }

    /// Set the per-call transfer limit in bytes.
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len;
        self
    }
}

/// An open spidev channel.
///
/// The file descriptor is closed on drop; [`close`](Self::close) only makes
/// the hand-back explicit at the call site.
#[derive(Debug)]
pub struct SpiLink {
    file: File,
    device: String,
    speed_hz: u32,
    delay_usecs: u16,
    chunk_len: usize,
}

impl SpiLink {
    /// Open the device node and configure mode, word size and clock.
    ///
    /// Any failure hands the descriptor back before returning.
    pub fn open(config: &SpiLinkConfig) -> Result<Self> {
        if config.mode > mode::MODE_3 {
            return Err(SpiLinkError::InvalidMode(config.mode));
        }
        if config.chunk_len == 0 {
            return Err(SpiLinkError::InvalidChunkLen);
        }

        log::debug!("spi: opening {}", config.device);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| SpiLinkError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;
        let fd = file.as_raw_fd();

        let spi_mode = config.mode;
        unsafe { ioctl::spi_ioc_wr_mode(fd, &spi_mode) }.map_err(|e| {
            SpiLinkError::SetModeFailed {
                mode: spi_mode,
                source: io::Error::from_raw_os_error(e as i32),
            }
        })?;

        let bits = BITS_PER_WORD;
        unsafe { ioctl::spi_ioc_wr_bits_per_word(fd, &bits) }.map_err(|e| {
            SpiLinkError::SetBitsPerWordFailed {
                bits,
                source: io::Error::from_raw_os_error(e as i32),
            }
        })?;

        let speed_hz = config.speed_hz;
        unsafe { ioctl::spi_ioc_wr_max_speed_hz(fd, &speed_hz) }.map_err(|e| {
            SpiLinkError::SetSpeedFailed {
                speed_hz,
                source: io::Error::from_raw_os_error(e as i32),
            }
        })?;

        // A chunk larger than the driver's message buffer would be rejected
        // wholesale, so cap to the kernel's limit when it is exposed.
        let mut chunk_len = config.chunk_len;
        if let Some(bufsiz) = kernel_buf_size() {
            if bufsiz < chunk_len {
                log::debug!("spi: kernel bufsiz {} caps {} byte chunks", bufsiz, chunk_len);
                chunk_len = bufsiz;
            }
        }

        log::info!(
            "spi: {} mode {}, {} kHz, {} byte chunks",
            config.device,
            spi_mode,
            speed_hz / 1000,
            chunk_len
        );

        Ok(Self {
            file,
            device: config.device.clone(),
            speed_hz,
            delay_usecs: config.delay_usecs,
            chunk_len,
        })
    }

    /// Open `device` with default settings.
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&SpiLinkConfig::new(device))
    }

    /// Hand the device back. Dropping the link does the same.
    pub fn close(self) {}
}

impl Drop for SpiLink {
    fn drop(&mut self) {
        log::debug!("spi: closing {}", self.device);
    }
}

impl SpiPort for SpiLink {
    fn max_chunk_len(&self) -> usize {
        self.chunk_len
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let transfer = SpiIocTransfer {
            tx_buf: data.as_ptr() as u64,
            rx_buf: 0,
            len: data.len() as u32,
            speed_hz: self.speed_hz,
            delay_usecs: self.delay_usecs,
            bits_per_word: BITS_PER_WORD,
            cs_change: 0,
            tx_nbits: 0,
            rx_nbits: 0,
            word_delay_usecs: 0,
            _pad: 0,
        };

        // Returns the number of bytes moved, or -1 with errno set.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                ioctl::spi_ioc_message(1),
                &transfer,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ret as usize)
    }

    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(us as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_transfer_struct_matches_kernel_layout() {
        assert_eq!(mem::size_of::<SpiIocTransfer>(), ioctl::SPI_IOC_TRANSFER_SIZE);
    }

    #[test]
    fn test_message_request_number_matches_header() {
        // SPI_IOC_MESSAGE(1) as the C header computes it on 64-bit Linux.
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6b00);
        assert_eq!(ioctl::spi_ioc_message(2), 0x4040_6b00);
    }

    #[test]
    fn test_config_defaults_match_wiring() {
        let config = SpiLinkConfig::default();
        assert_eq!(config.device, DEFAULT_DEVICE);
        assert_eq!(config.speed_hz, 2_000_000);
        assert_eq!(config.mode, mode::MODE_3);
        assert_eq!(config.delay_usecs, 0);
        assert_eq!(config.chunk_len, 4096);
    }

    #[test]
    fn test_config_builders_apply() {
        let config = SpiLinkConfig::new("/dev/spidev1.2")
            .with_speed(500_000)
            .with_mode(mode::MODE_0)
            .with_delay(10)
            .with_chunk_len(256);
        assert_eq!(config.device, "/dev/spidev1.2");
        assert_eq!(config.speed_hz, 500_000);
        assert_eq!(config.mode, mode::MODE_0);
        assert_eq!(config.delay_usecs, 10);
        assert_eq!(config.chunk_len, 256);
    }

    #[test]
    fn test_rejects_invalid_mode_before_touching_device() {
        let err = SpiLink::open(&SpiLinkConfig::default().with_mode(4)).unwrap_err();
        assert!(matches!(err, SpiLinkError::InvalidMode(4)));
    }

    #[test]
    fn test_rejects_zero_chunk_len_before_touching_device() {
        let err = SpiLink::open(&SpiLinkConfig::default().with_chunk_len(0)).unwrap_err();
        assert!(matches!(err, SpiLinkError::InvalidChunkLen));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let err = SpiLink::open(&SpiLinkConfig::new("/nonexistent/spidev")).unwrap_err();
        match err {
            SpiLinkError::OpenFailed { path, .. } => {
                assert_eq!(path, "/nonexistent/spidev");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
