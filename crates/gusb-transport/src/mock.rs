//! Scripted device for testing the protocol stack without hardware.
//!
//! [`MockDevice`] implements [`DeviceIo`] with queued bulk and async reads
//! and records every write. Clones share state, so a test can hand one
//! clone to a [`Transport`](crate::Transport) and inspect the other.
//! Available in unit tests and behind the `mock` feature.
//!
//! ```ignore
//! use gusb_transport::{mock::MockDevice, Transport};
//!
//! let device = MockDevice::new().with_packet_size(64);
//! device.push_bulk(vec![0x14, 0, 0, 0]);
//!
//! let mut transport = Transport::from_device(device.clone());
//! transport.write(&[0u8; 12]).unwrap();
//! assert_eq!(device.writes().len(), 1);
//! ```

use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::device::{CancelIo, DeviceIo};

#[derive(Debug)]
struct MockState {
    bulk_reads: VecDeque<io::Result<Vec<u8>>>,
    async_reads: VecDeque<io::Result<Vec<u8>>>,
    packet_size: Option<usize>,
    write_limit: Option<usize>,
    writes: Vec<Vec<u8>>,
    close_count: usize,
    blocking: bool,
    cancelled: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Bulk,
    Async,
}

impl Channel {
    fn name(self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::Async => "async",
        }
    }
}

/// A scripted [`DeviceIo`] implementation.
///
/// Reads are served in queue order. An exhausted queue yields an
/// `UnexpectedEof` error, so a read loop under test terminates instead of
/// spinning. A [`blocking`](Self::blocking) device waits for the next push
/// or for cancellation instead.
#[derive(Debug, Clone)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl MockDevice {
    /// Create a device reporting a 64-byte packet size with empty read queues.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState {
                    bulk_reads: VecDeque::new(),
                    async_reads: VecDeque::new(),
                    packet_size: Some(64),
                    write_limit: None,
                    writes: Vec::new(),
                    close_count: 0,
                    blocking: false,
                    cancelled: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Report `size` from the packet size query.
    pub fn with_packet_size(self, size: usize) -> Self {
        self.lock().packet_size = Some(size);
        self
    }

    /// Fail the packet size query, as drivers without the control code do.
    pub fn without_packet_size(self) -> Self {
        self.lock().packet_size = None;
        self
    }

    /// Report at most `limit` bytes written per write call.
    pub fn with_write_limit(self, limit: usize) -> Self {
        self.lock().write_limit = Some(limit);
        self
    }

    /// Block reads on an empty queue until data is pushed or the device is
    /// cancelled, like a real device with nothing to say.
    pub fn blocking(self) -> Self {
        self.lock().blocking = true;
        self
    }

    /// Queue a bulk read result.
    pub fn push_bulk(&self, bytes: impl Into<Vec<u8>>) {
        self.push(Channel::Bulk, Ok(bytes.into()));
    }

    /// Queue a failing bulk read.
    pub fn push_bulk_error(&self, kind: ErrorKind) {
        self.push(Channel::Bulk, Err(io::Error::from(kind)));
    }

    /// Queue an async-channel read result.
    pub fn push_async(&self, bytes: impl Into<Vec<u8>>) {
        self.push(Channel::Async, Ok(bytes.into()));
    }

    /// Queue a failing async-channel read.
    pub fn push_async_error(&self, kind: ErrorKind) {
        self.push(Channel::Async, Err(io::Error::from(kind)));
    }

    /// Every buffer passed to `write`, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Number of bulk reads still queued.
    pub fn pending_bulk(&self) -> usize {
        self.lock().bulk_reads.len()
    }

    /// Number of async reads still queued.
    pub fn pending_async(&self) -> usize {
        self.lock().async_reads.len()
    }

    /// How many times `close` reached the device.
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Whether a canceller has fired on this device.
    pub fn was_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.shared.lock()
    }

    fn push(&self, channel: Channel, read: io::Result<Vec<u8>>) {
        let mut state = self.lock();
        match channel {
            Channel::Bulk => state.bulk_reads.push_back(read),
            Channel::Async => state.async_reads.push_back(read),
        }
        self.shared.ready.notify_all();
    }

    fn serve(&self, channel: Channel, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        loop {
            if state.cancelled {
                return Err(io::Error::new(ErrorKind::Interrupted, "mock read cancelled"));
            }
            let queue = match channel {
                Channel::Bulk => &mut state.bulk_reads,
                Channel::Async => &mut state.async_reads,
            };
            match queue.pop_front() {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    return Ok(n);
                }
                Some(Err(err)) => return Err(err),
                None if state.blocking => {
                    state = self
                        .shared
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("mock {} queue exhausted", channel.name()),
                    ));
                }
            }
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct MockCanceller {
    shared: Arc<Shared>,
}

impl CancelIo for MockCanceller {
    fn cancel(&self) -> io::Result<()> {
        self.shared.lock().cancelled = true;
        self.shared.ready.notify_all();
        Ok(())
    }
}

impl DeviceIo for MockDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.writes.push(buf.to_vec());
        Ok(state
            .write_limit
            .map_or(buf.len(), |limit| buf.len().min(limit)))
    }

    fn read_bulk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.serve(Channel::Bulk, buf)
    }

    fn read_async(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.serve(Channel::Async, buf)
    }

    fn query_packet_size(&mut self) -> io::Result<usize> {
        self.lock()
            .packet_size
            .ok_or_else(|| io::Error::from(ErrorKind::Unsupported))
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().close_count += 1;
        Ok(())
    }

    fn canceller(&self) -> Arc<dyn CancelIo> {
        Arc::new(MockCanceller {
            shared: Arc::clone(&self.shared),
        })
    }
}
