//! Garmin USB packet envelope and capability codec.
//!
//! Every exchange with a device is a packet with a fixed 12-byte header:
//! - a 1-byte kind (transport layer or application layer)
//! - a 2-byte little-endian packet id
//! - a 4-byte little-endian payload length
//! - reserved bytes, carried but never interpreted
//!
//! The protocol-array payload a device returns during the handshake decodes
//! into a [`CapabilitySet`].

pub mod capability;
pub mod codec;
pub mod error;
pub mod ids;

pub use capability::{
    decode_capability_list, encode_capability_list, CapabilityDescriptor, CapabilitySet,
    CapabilityTag, DESCRIPTOR_SIZE,
};
pub use codec::{
    decode_packet, encode_packet, Packet, PacketKind, Reserved, HEADER_SIZE, MAX_PAYLOAD,
};
pub use error::{DecodeError, EncodeError, Result};
pub use ids::packet_name;
