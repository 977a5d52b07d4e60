use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::config::{TransportConfig, DEFAULT_PACKET_SIZE};
use crate::device::{CancelIo, DeviceIo};
use crate::error::{Result, TransportError};
use crate::platform::{self, PlatformDevice};

/// One opened Garmin USB device.
///
/// Owns the device handle and the packet size negotiated at open time.
/// Writes follow the USB framing rule that a transfer whose length is an
/// exact multiple of the packet size must be followed by a zero-length
/// write. The handle is released exactly once, either by [`close`](Self::close)
/// or on drop.
pub struct Transport<D: DeviceIo> {
    device: Option<D>,
    packet_size: usize,
    config: TransportConfig,
    canceller: Canceller,
}

/// Cloneable handle that shuts a [`Transport`] down from another thread.
///
/// [`cancel`](Self::cancel) aborts the read in flight, which returns
/// [`TransportError::ReadFailed`]. Every later read fails the same way and
/// writes fail with [`TransportError::Closed`]. The owner still releases the
/// handle through [`Transport::close`] or drop.
#[derive(Clone)]
pub struct Canceller {
    cancelled: Arc<AtomicBool>,
    device: Arc<dyn CancelIo>,
}

impl Canceller {
    fn new(device: Arc<dyn CancelIo>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            device,
        }
    }

    /// Abort pending and future I/O on the transport. Idempotent.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.device.cancel() {
            Ok(()) => debug!("transport cancelled"),
            Err(err) => debug!(%err, "cancelling pending device I/O failed"),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Canceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canceller")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn cancelled_read() -> TransportError {
    TransportError::ReadFailed(io::Error::new(
        io::ErrorKind::Interrupted,
        "transport cancelled",
    ))
}

impl<D: DeviceIo> Transport<D> {
    /// Wrap an opened device, negotiating the packet size with default configuration.
    pub fn from_device(device: D) -> Self {
        Self::from_device_with_config(device, TransportConfig::default())
    }

    /// Wrap an opened device with explicit configuration.
    ///
    /// The packet size is queried once here. A device that cannot answer the
    /// query (or answers zero) gets `config.default_packet_size`, and a zero
    /// fallback is replaced by [`DEFAULT_PACKET_SIZE`].
    pub fn from_device_with_config(mut device: D, config: TransportConfig) -> Self {
        let fallback = match config.default_packet_size {
            0 => DEFAULT_PACKET_SIZE,
            size => size,
        };
        let packet_size = match device.query_packet_size() {
            Ok(size) if size > 0 => size,
            Ok(_) => {
                debug!(
                    default = fallback,
                    "device reported zero packet size; using default"
                );
                fallback
            }
            Err(err) => {
                debug!(
                    %err,
                    default = fallback,
                    "packet size query unsupported; using default"
                );
                fallback
            }
        };
        debug!(packet_size, "transport opened");

        let canceller = Canceller::new(device.canceller());
        Self {
            device: Some(device),
            packet_size,
            config,
            canceller,
        }
    }

    /// USB packet size negotiated when the transport was opened.
    pub fn negotiated_packet_size(&self) -> usize {
        self.packet_size
    }

    /// Current transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Handle for aborting this transport's reads from another thread.
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Write `bytes` to the device as one transfer.
    ///
    /// When `bytes.len()` is a nonzero multiple of the negotiated packet size
    /// an extra zero-length write follows, otherwise the device waits for
    /// the rest of a transfer that never comes.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let packet_size = self.packet_size;
        let device = self.device_mut()?;

        let written = device.write(bytes)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                expected: bytes.len(),
                written,
            });
        }
        trace!(len = bytes.len(), "wrote transfer");

        if !bytes.is_empty() && bytes.len() % packet_size == 0 {
            debug!(
                len = bytes.len(),
                packet_size, "transfer fills whole packets; sending zero-length write"
            );
            let written = device.write(&[])?;
            if written != 0 {
                return Err(TransportError::ShortWrite {
                    expected: 0,
                    written,
                });
            }
        }

        Ok(())
    }

    /// Perform one bulk read of up to `config.read_buffer_size` bytes.
    ///
    /// The returned buffer is truncated to the byte count the driver reports.
    /// An empty buffer, or one whose first byte is zero, is how the device
    /// marks the end of a burst; interpreting it is up to the caller.
    pub fn read_buffer(&mut self) -> Result<Bytes> {
        let buf = self.read_with(self.config.read_buffer_size, D::read_bulk)?;
        trace!(read = buf.len(), "bulk read");
        Ok(buf)
    }

    /// Perform one read of up to `config.control_read_size` bytes from the
    /// async (interrupt) channel.
    ///
    /// Used only while waiting for the session-started reply; the device
    /// delivers it on this channel instead of the bulk one.
    pub fn read_control_packet(&mut self) -> Result<Bytes> {
        let buf = self.read_with(self.config.control_read_size, D::read_async)?;
        trace!(read = buf.len(), "control read");
        Ok(buf)
    }

    fn read_with(
        &mut self,
        size: usize,
        read: impl FnOnce(&mut D, &mut [u8]) -> io::Result<usize>,
    ) -> Result<Bytes> {
        if self.canceller.is_cancelled() {
            return Err(cancelled_read());
        }
        let device = self.device_mut()?;

        let mut buf = BytesMut::zeroed(size);
        let result = read(device, &mut buf[..]);
        if self.canceller.is_cancelled() {
            return Err(cancelled_read());
        }
        let read = result.map_err(TransportError::ReadFailed)?;
        buf.truncate(read.min(size));
        Ok(buf.freeze())
    }

    /// Release the device handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut device) = self.device.take() {
            device.close()?;
            debug!("transport closed");
        }
        Ok(())
    }

    /// Whether the device handle is still held.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Borrow the underlying device, if still open.
    pub fn get_ref(&self) -> Option<&D> {
        self.device.as_ref()
    }

    fn device_mut(&mut self) -> Result<&mut D> {
        if self.canceller.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.device.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport<PlatformDevice> {
    /// Open a device path exclusively, with default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, TransportConfig::default())
    }

    /// Open a device path exclusively, with explicit configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: TransportConfig) -> Result<Self> {
        let device = platform::open_device(path.as_ref())?;
        Ok(Self::from_device_with_config(device, config))
    }
}

impl<D: DeviceIo> Drop for Transport<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(%err, "failed to close transport on drop");
        }
    }
}

impl<D: DeviceIo> std::fmt::Debug for Transport<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("open", &self.device.is_some())
            .field("packet_size", &self.packet_size)
            .field("config", &self.config)
            .field("cancelled", &self.canceller.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::mock::MockDevice;

    #[test]
    fn negotiates_packet_size_from_device() {
        let transport = Transport::from_device(MockDevice::new().with_packet_size(512));
        assert_eq!(transport.negotiated_packet_size(), 512);
    }

    #[test]
    fn falls_back_when_size_query_unsupported() {
        let transport = Transport::from_device(MockDevice::new().without_packet_size());
        assert_eq!(transport.negotiated_packet_size(), 64);
    }

    #[test]
    fn falls_back_when_size_query_reports_zero() {
        let cfg = TransportConfig {
            default_packet_size: 32,
            ..TransportConfig::default()
        };
        let transport =
            Transport::from_device_with_config(MockDevice::new().with_packet_size(0), cfg);
        assert_eq!(transport.negotiated_packet_size(), 32);
    }

    #[test]
    fn zero_default_packet_size_falls_back_to_64() {
        let device = MockDevice::new().without_packet_size();
        let cfg = TransportConfig {
            default_packet_size: 0,
            ..TransportConfig::default()
        };
        let mut transport = Transport::from_device_with_config(device.clone(), cfg);

        assert_eq!(transport.negotiated_packet_size(), DEFAULT_PACKET_SIZE);
        transport.write(&[0; 12]).unwrap();
        transport.write(&[0; 64]).unwrap();
        assert_eq!(device.writes().len(), 3);
    }

    #[test]
    fn exact_packet_multiple_adds_zero_length_write() {
        let device = MockDevice::new().with_packet_size(64);
        let mut transport = Transport::from_device(device.clone());

        transport.write(&[0xAA; 64]).unwrap();

        let writes = device.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), 64);
        assert!(writes[1].is_empty());
    }

    #[test]
    fn two_packet_multiple_adds_zero_length_write() {
        let device = MockDevice::new().with_packet_size(64);
        let mut transport = Transport::from_device(device.clone());

        transport.write(&[0x01; 128]).unwrap();

        assert_eq!(device.writes().len(), 2);
    }

    #[test]
    fn one_byte_over_packet_size_writes_once() {
        let device = MockDevice::new().with_packet_size(64);
        let mut transport = Transport::from_device(device.clone());

        transport.write(&[0x55; 65]).unwrap();

        let writes = device.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 65);
    }

    #[test]
    fn empty_write_is_not_followed_by_terminator() {
        let device = MockDevice::new();
        let mut transport = Transport::from_device(device.clone());

        transport.write(&[]).unwrap();

        assert_eq!(device.writes().len(), 1);
    }

    #[test]
    fn short_write_is_reported() {
        let device = MockDevice::new().with_write_limit(4);
        let mut transport = Transport::from_device(device);

        let err = transport.write(b"too long").unwrap_err();
        assert!(matches!(
            err,
            TransportError::ShortWrite {
                expected: 8,
                written: 4
            }
        ));
    }

    #[test]
    fn read_buffer_truncates_to_reported_length() {
        let device = MockDevice::new();
        device.push_bulk(vec![1, 2, 3]);
        let mut transport = Transport::from_device(device);

        let buf = transport.read_buffer().unwrap();
        assert_eq!(buf.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn read_buffer_is_bounded_by_config() {
        let device = MockDevice::new();
        device.push_bulk(vec![7; 32]);
        let cfg = TransportConfig {
            read_buffer_size: 16,
            ..TransportConfig::default()
        };
        let mut transport = Transport::from_device_with_config(device, cfg);

        assert_eq!(transport.read_buffer().unwrap().len(), 16);
    }

    #[test]
    fn read_failure_is_distinct_from_empty_read() {
        let device = MockDevice::new();
        device.push_bulk(Vec::new());
        device.push_bulk_error(ErrorKind::BrokenPipe);
        let mut transport = Transport::from_device(device);

        assert!(transport.read_buffer().unwrap().is_empty());
        let err = transport.read_buffer().unwrap_err();
        assert!(matches!(err, TransportError::ReadFailed(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn control_reads_use_async_channel() {
        let device = MockDevice::new();
        device.push_async(vec![0, 0, 0, 0, 6]);
        device.push_bulk(vec![9]);
        let mut transport = Transport::from_device(device.clone());

        let control = transport.read_control_packet().unwrap();
        assert_eq!(control.as_ref(), &[0, 0, 0, 0, 6]);
        assert_eq!(device.pending_bulk(), 1);
    }

    #[test]
    fn control_read_is_bounded_to_64_bytes() {
        let device = MockDevice::new();
        device.push_async(vec![1; 100]);
        let mut transport = Transport::from_device(device);

        assert_eq!(transport.read_control_packet().unwrap().len(), 64);
    }

    #[test]
    fn close_is_idempotent_and_releases_once() {
        let device = MockDevice::new();
        let mut transport = Transport::from_device(device.clone());

        transport.close().unwrap();
        transport.close().unwrap();
        drop(transport);

        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn drop_releases_handle() {
        let device = MockDevice::new();
        drop(Transport::from_device(device.clone()));
        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn operations_after_close_fail() {
        let mut transport = Transport::from_device(MockDevice::new());
        transport.close().unwrap();

        assert!(!transport.is_open());
        assert!(matches!(transport.write(b"x"), Err(TransportError::Closed)));
        assert!(matches!(transport.read_buffer(), Err(TransportError::Closed)));
        assert!(matches!(
            transport.read_control_packet(),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn cancel_from_another_thread_unblocks_read() {
        let device = MockDevice::new().blocking();
        let mut transport = Transport::from_device(device.clone());
        let canceller = transport.canceller();

        let watchdog = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let err = transport.read_buffer().unwrap_err();
        watchdog.join().unwrap();

        match err {
            TransportError::ReadFailed(e) => assert_eq!(e.kind(), ErrorKind::Interrupted),
            other => panic!("expected read failure, got {other:?}"),
        }
        assert!(device.was_cancelled());
    }

    #[test]
    fn cancelled_transport_fails_reads_and_writes() {
        let device = MockDevice::new();
        device.push_bulk(vec![20, 0, 0, 0]);
        let mut transport = Transport::from_device(device.clone());

        let canceller = transport.canceller();
        canceller.cancel();
        canceller.cancel();

        assert!(transport.canceller().is_cancelled());
        assert!(matches!(
            transport.read_buffer(),
            Err(TransportError::ReadFailed(_))
        ));
        assert!(matches!(
            transport.read_control_packet(),
            Err(TransportError::ReadFailed(_))
        ));
        assert!(matches!(transport.write(b"x"), Err(TransportError::Closed)));
        assert_eq!(device.pending_bulk(), 1);

        drop(transport);
        assert_eq!(device.close_count(), 1);
    }
}
