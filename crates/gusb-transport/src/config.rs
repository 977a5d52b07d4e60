/// Size of the bulk read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Size of one async (interrupt channel) read.
pub const DEFAULT_CONTROL_READ_SIZE: usize = 64;

/// Packet size assumed when the driver does not answer the size query.
pub const DEFAULT_PACKET_SIZE: usize = 64;

/// Configuration for an opened [`Transport`](crate::Transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Bytes requested by each bulk read. Default: 4096.
    pub read_buffer_size: usize,
    /// Bytes requested by each control-channel read. Default: 64.
    pub control_read_size: usize,
    /// Fallback USB packet size. Default: 64.
    pub default_packet_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            control_read_size: DEFAULT_CONTROL_READ_SIZE,
            default_packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}
