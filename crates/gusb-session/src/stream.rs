//! Packet stream over the bulk read channel.
//!
//! Each bulk read yields at most one packet. The device delimits logical
//! responses with a marker read that is empty or starts with a zero byte;
//! the stream reports those as [`StreamItem::EndOfBurst`] and leaves it to
//! the consumer to decide whether the marker matters. Control-channel reads
//! never pass through here, so the marker rule applies to bulk reads only.
//!
//! Transport-layer packets also lead with a zero byte. [`PacketStream::next_item`]
//! reports them as markers, while [`PacketStream::wait_for_packet`] still
//! decodes a zero-led read and returns it when it carries the awaited id.

use gusb_packet::{decode_packet, Packet};
use gusb_transport::{DeviceIo, Transport};
use tracing::trace;

use crate::error::Result;

/// One item read from the bulk channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A decoded packet.
    Packet(Packet),
    /// An end-of-burst marker read.
    EndOfBurst,
}

/// Whether a bulk read is an end-of-burst marker.
pub fn is_end_of_burst(buf: &[u8]) -> bool {
    buf.first().is_none_or(|&b| b == 0)
}

/// Lazy sequence of packets read from one transport.
///
/// Nothing is buffered beyond the current read, so dropping the stream and
/// creating a new one over the same transport loses nothing. As an
/// [`Iterator`] it ends after yielding its first error.
pub struct PacketStream<'a, D: DeviceIo> {
    transport: &'a mut Transport<D>,
    failed: bool,
}

impl<'a, D: DeviceIo> PacketStream<'a, D> {
    pub fn new(transport: &'a mut Transport<D>) -> Self {
        Self {
            transport,
            failed: false,
        }
    }

    /// Perform one bulk read and classify it.
    pub fn next_item(&mut self) -> Result<StreamItem> {
        let buf = self.transport.read_buffer()?;
        if is_end_of_burst(&buf) {
            trace!(len = buf.len(), "end-of-burst marker");
            return Ok(StreamItem::EndOfBurst);
        }

        let packet = decode_packet(&buf)?;
        trace!(kind = %packet.kind, id = packet.id, size = packet.payload_size(), "packet read");
        Ok(StreamItem::Packet(packet))
    }

    /// Block until a packet with `expected_id` arrives.
    ///
    /// Packets with other ids and end-of-burst markers are discarded. A
    /// zero-led read that decodes to the awaited id is a transport-layer
    /// packet, not a marker, and is returned. There is no timeout; the call
    /// returns only on a match or an error.
    pub fn wait_for_packet(&mut self, expected_id: i16) -> Result<Packet> {
        loop {
            let buf = self.transport.read_buffer()?;
            if is_end_of_burst(&buf) {
                match decode_packet(&buf) {
                    Ok(packet) if packet.id == expected_id => return Ok(packet),
                    _ => trace!(len = buf.len(), "skipping end-of-burst marker"),
                }
                continue;
            }

            let packet = decode_packet(&buf)?;
            if packet.id == expected_id {
                return Ok(packet);
            }
            trace!(id = packet.id, expected_id, "discarding packet");
        }
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &Transport<D> {
        self.transport
    }
}

impl<D: DeviceIo> Iterator for PacketStream<'_, D> {
    type Item = Result<StreamItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_item();
        self.failed = item.is_err();
        Some(item)
    }
}

/// Block until a packet with `expected_id` arrives on `transport`.
pub fn wait_for_packet<D: DeviceIo>(
    transport: &mut Transport<D>,
    expected_id: i16,
) -> Result<Packet> {
    PacketStream::new(transport).wait_for_packet(expected_id)
}
