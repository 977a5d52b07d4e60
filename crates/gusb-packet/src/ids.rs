//! Well-known packet ids.
//!
//! Ids are only meaningful together with the packet kind: transport id 6
//! and application id 6 are unrelated.

use crate::codec::PacketKind;

/// Transport layer: device has data queued on the bulk channel.
pub const DATA_AVAILABLE: i16 = 2;

/// Transport layer: host asks the device to start a session.
pub const START_SESSION: i16 = 5;

/// Transport layer: device acknowledges the session; payload carries the unit id.
pub const SESSION_STARTED: i16 = 6;

/// Application layer: extended product data strings.
pub const EXT_PRODUCT_DATA: i16 = 248;

/// Application layer: list of supported protocols and data types.
pub const PROTOCOL_ARRAY: i16 = 253;

/// Application layer: host asks for product information.
pub const PRODUCT_REQUEST: i16 = 254;

/// Application layer: product id, software version and description.
pub const PRODUCT_DATA: i16 = 255;

/// Returns a human-readable name for a packet id, or `None` when the id is
/// not one of the well-known ones for its kind.
pub fn packet_name(kind: PacketKind, id: i16) -> Option<&'static str> {
    match (kind, id) {
        (PacketKind::Transport, DATA_AVAILABLE) => Some("DATA_AVAILABLE"),
        (PacketKind::Transport, START_SESSION) => Some("START_SESSION"),
        (PacketKind::Transport, SESSION_STARTED) => Some("SESSION_STARTED"),
        (PacketKind::Application, EXT_PRODUCT_DATA) => Some("EXT_PRODUCT_DATA"),
        (PacketKind::Application, PROTOCOL_ARRAY) => Some("PROTOCOL_ARRAY"),
        (PacketKind::Application, PRODUCT_REQUEST) => Some("PRODUCT_REQUEST"),
        (PacketKind::Application, PRODUCT_DATA) => Some("PRODUCT_DATA"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_depend_on_kind() {
        assert_eq!(
            packet_name(PacketKind::Transport, 6),
            Some("SESSION_STARTED")
        );
        assert_eq!(packet_name(PacketKind::Application, 6), None);
        assert_eq!(
            packet_name(PacketKind::Application, 253),
            Some("PROTOCOL_ARRAY")
        );
        assert_eq!(packet_name(PacketKind::Other(3), 255), None);
    }
}
