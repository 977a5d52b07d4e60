/// Errors that can occur while encoding a packet.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The payload does not fit the signed 32-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Errors that can occur while decoding packets or capability lists.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is shorter than the header plus the declared payload.
    #[error("truncated packet (need {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// The header declares a negative payload length.
    #[error("invalid payload length {0}")]
    InvalidLength(i32),

    /// A capability list whose length is not a multiple of the record size.
    #[error("capability list length {len} is not a multiple of 3")]
    Misaligned { len: usize },

    /// Text that is not a canonical capability string such as `A1100`.
    #[error("invalid capability '{0}' (expected <tag><number>, e.g. A1100)")]
    InvalidCapability(String),
}

/// Crate result; decoding errors unless stated otherwise.
pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
