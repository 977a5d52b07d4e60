/// Errors that can occur while establishing or using a device session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gusb_transport::TransportError),

    /// A read did not hold a well-formed packet.
    #[error("decode error: {0}")]
    Decode(#[from] gusb_packet::DecodeError),

    /// An outgoing packet could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] gusb_packet::EncodeError),

    /// Device enumeration failed.
    #[error("discovery error: {0}")]
    Discovery(#[from] gusb_transport::DiscoveryError),

    /// The device answered with a packet the handshake did not expect.
    #[error("unexpected packet id {got} (expected {expected})")]
    UnexpectedPacket { expected: i16, got: i16 },

    /// The session-started reply is too short to carry a unit id.
    #[error("session-started payload too short ({0} bytes, need 4)")]
    ShortSessionPayload(usize),

    /// The connection has no established session yet.
    #[error("session not established")]
    NotEstablished,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
