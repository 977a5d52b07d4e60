use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, EncodeError, Result};

/// Packet header: kind (1) + reserved (1) + reserved (2) + id (2) + reserved (2) + length (4).
pub const HEADER_SIZE: usize = 12;

/// Largest payload the signed 32-bit length field can describe.
pub const MAX_PAYLOAD: usize = i32::MAX as usize;

/// Layer a packet belongs to (header byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// USB protocol layer: session start and data-available notifications.
    Transport,
    /// Application layer: product data, protocol array, device records.
    Application,
    /// Any other tag byte, kept so unknown traffic still decodes.
    Other(u8),
}

impl PacketKind {
    /// Wire tag of [`PacketKind::Transport`].
    pub const TRANSPORT_TAG: u8 = 0;
    /// Wire tag of [`PacketKind::Application`].
    pub const APPLICATION_TAG: u8 = 20;

    pub fn from_byte(tag: u8) -> Self {
        match tag {
            Self::TRANSPORT_TAG => Self::Transport,
            Self::APPLICATION_TAG => Self::Application,
            other => Self::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Transport => Self::TRANSPORT_TAG,
            Self::Application => Self::APPLICATION_TAG,
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::Application => f.write_str("application"),
            Self::Other(tag) => write!(f, "kind-{tag}"),
        }
    }
}

/// Header fields with no defined meaning. Carried through decode and
/// encode unchanged, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Reserved {
    /// Byte 1.
    pub byte1: u8,
    /// Bytes 2-3.
    pub word2: i16,
    /// Bytes 6-7.
    pub word6: i16,
}

/// One Garmin USB packet: header fields plus payload.
///
/// The payload length on the wire is always `payload.len()`; there is no
/// separate length field to drift out of sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Protocol layer of this packet.
    pub kind: PacketKind,
    /// Packet identifier; meaning depends on the layer and protocol.
    pub id: i16,
    /// Reserved header fields.
    pub reserved: Reserved,
    /// Packet payload.
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet with zeroed reserved fields.
    pub fn new(kind: PacketKind, id: i16, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            id,
            reserved: Reserved::default(),
            payload: payload.into(),
        }
    }

    /// Create a transport-layer packet with an empty payload.
    pub fn transport(id: i16) -> Self {
        Self::new(PacketKind::Transport, id, Bytes::new())
    }

    /// Create an application-layer packet.
    pub fn application(id: i16, payload: impl Into<Bytes>) -> Self {
        Self::new(PacketKind::Application, id, payload)
    }

    /// Number of payload bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Total wire size (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Append the wire form of this packet, reserved fields included, to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        put_packet(self.kind, self.id, self.reserved, &self.payload, dst)
    }

    /// The wire form of this packet as one buffer.
    pub fn to_bytes(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Encode a packet into the wire format.
///
/// Wire format (all integers little-endian):
/// ```text
/// ┌──────┬──────┬──────────┬──────────┬──────────┬─────────────┬──────────────┐
/// │ Kind │ Rsv  │ Reserved │ Id       │ Reserved │ Length      │ Payload      │
/// │ 1B   │ 1B   │ 2B       │ 2B (i16) │ 2B       │ 4B (i32)    │ Length bytes │
/// └──────┴──────┴──────────┴──────────┴──────────┴─────────────┴──────────────┘
/// ```
/// Reserved fields are written as zero.
pub fn encode_packet(
    kind: PacketKind,
    id: i16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    put_packet(kind, id, Reserved::default(), payload, dst)
}

fn put_packet(
    kind: PacketKind,
    id: i16,
    reserved: Reserved,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    let length = length_field(payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(kind.as_byte());
    dst.put_u8(reserved.byte1);
    dst.put_i16_le(reserved.word2);
    dst.put_i16_le(id);
    dst.put_i16_le(reserved.word6);
    dst.put_i32_le(length);
    dst.put_slice(payload);
    Ok(())
}

fn length_field(len: usize) -> Result<i32, EncodeError> {
    i32::try_from(len).map_err(|_| EncodeError::PayloadTooLarge {
        size: len,
        max: MAX_PAYLOAD,
    })
}

/// Decode one packet from the start of `src`.
///
/// Bytes after the declared payload are ignored; device reads hand back a
/// fixed-size buffer with padding after the packet.
pub fn decode_packet(src: &[u8]) -> Result<Packet> {
    if src.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated {
            needed: HEADER_SIZE,
            available: src.len(),
        });
    }

    let mut header = &src[..HEADER_SIZE];
    let kind = PacketKind::from_byte(header.get_u8());
    let byte1 = header.get_u8();
    let word2 = header.get_i16_le();
    let id = header.get_i16_le();
    let word6 = header.get_i16_le();
    let declared = header.get_i32_le();

    let payload_len = usize::try_from(declared).map_err(|_| DecodeError::InvalidLength(declared))?;
    let needed = HEADER_SIZE.saturating_add(payload_len);
    if src.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: src.len(),
        });
    }

    Ok(Packet {
        kind,
        id,
        reserved: Reserved {
            byte1,
            word2,
            word6,
        },
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..needed]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(kind: PacketKind, id: i16, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_packet(kind, id, payload, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = b"Alpha100";
        let buf = encode(PacketKind::Application, 255, payload);

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let packet = decode_packet(&buf).unwrap();
        assert_eq!(
            packet,
            Packet::application(255, Bytes::from_static(payload))
        );
    }

    #[test]
    fn test_roundtrip_boundary_ids_and_lengths() {
        let kinds = [
            PacketKind::Transport,
            PacketKind::Application,
            PacketKind::Other(7),
        ];
        for kind in kinds {
            for id in [i16::MIN, -1, 0, i16::MAX] {
                for len in [0, 1, 4084, 4096] {
                    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                    let buf = encode(kind, id, &payload);
                    assert_eq!(buf.len(), HEADER_SIZE + len);

                    let packet = decode_packet(&buf).unwrap();
                    assert_eq!(packet, Packet::new(kind, id, payload));
                }
            }
        }
    }

    #[test]
    fn test_wire_layout_is_bit_exact() {
        let buf = encode(PacketKind::Application, 254, &[0xAB, 0xCD]);
        assert_eq!(
            buf.as_ref(),
            &[20, 0, 0, 0, 254, 0, 0, 0, 2, 0, 0, 0, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_start_session_wire_form() {
        let bytes = Packet::transport(5).to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_negative_id_roundtrip() {
        let buf = encode(PacketKind::Application, -2, b"x");
        assert_eq!(&buf[4..6], &[0xFE, 0xFF]);
        assert_eq!(decode_packet(&buf).unwrap().id, -2);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let result = decode_packet(&[20, 0, 0]);
        assert_eq!(
            result,
            Err(DecodeError::Truncated {
                needed: HEADER_SIZE,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = encode(PacketKind::Application, 1, b"hello");
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_packet(&buf);
        assert_eq!(
            result,
            Err(DecodeError::Truncated {
                needed: HEADER_SIZE + 5,
                available: HEADER_SIZE + 2
            })
        );
    }

    #[test]
    fn test_decode_huge_declared_length_does_not_panic() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[20, 0, 0, 0, 1, 0, 0, 0]);
        buf.put_i32_le(i32::MAX);

        assert!(matches!(
            decode_packet(&buf),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_negative_length() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[20, 0, 0, 0, 1, 0, 0, 0]);
        buf.put_i32_le(-1);

        assert_eq!(decode_packet(&buf), Err(DecodeError::InvalidLength(-1)));
    }

    #[test]
    fn test_trailing_padding_ignored() {
        let mut buf = encode(PacketKind::Transport, 6, &[0x2A, 0, 0, 0]);
        buf.resize(4096, 0);

        let packet = decode_packet(&buf).unwrap();
        assert_eq!(packet.id, 6);
        assert_eq!(packet.payload.as_ref(), &[0x2A, 0, 0, 0]);
    }

    #[test]
    fn test_reserved_fields_preserved() {
        let raw = [20, 0x11, 0x22, 0x33, 10, 0, 0x44, 0x55, 1, 0, 0, 0, 0x99];
        let packet = decode_packet(&raw).unwrap();

        assert_eq!(packet.reserved.byte1, 0x11);
        assert_eq!(packet.reserved.word2, 0x3322);
        assert_eq!(packet.reserved.word6, 0x5544);
        assert_eq!(packet.to_bytes().unwrap().as_ref(), &raw[..]);
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let buf = encode(PacketKind::Other(7), 3, b"");
        let packet = decode_packet(&buf).unwrap();
        assert_eq!(packet.kind, PacketKind::Other(7));
        assert_eq!(packet.kind.to_string(), "kind-7");
    }

    #[test]
    fn test_empty_payload() {
        let buf = encode(PacketKind::Transport, 5, b"");
        let packet = decode_packet(&buf).unwrap();
        assert!(packet.payload.is_empty());
        assert_eq!(packet.payload_size(), 0);
    }

    #[test]
    fn test_multiple_packets_back_to_back() {
        let mut buf = encode(PacketKind::Application, 10, b"first");
        let first = decode_packet(&buf).unwrap();
        buf.advance(first.wire_size());
        buf.extend_from_slice(&encode(PacketKind::Application, 20, b"second"));

        let second = decode_packet(&buf).unwrap();
        assert_eq!(first.id, 10);
        assert_eq!(second.payload.as_ref(), b"second");
    }

    #[test]
    fn test_length_field_rejects_oversized_payload() {
        assert!(matches!(
            length_field(MAX_PAYLOAD + 1),
            Err(EncodeError::PayloadTooLarge { .. })
        ));
        assert_eq!(length_field(MAX_PAYLOAD).unwrap(), i32::MAX);
    }

    #[test]
    fn test_packet_wire_size() {
        let packet = Packet::application(3078, Bytes::from_static(b"test"));
        assert_eq!(packet.wire_size(), HEADER_SIZE + 4);
    }
}
