//! Session establishment and packet reading for Garmin USB devices.
//!
//! A session starts with a transport-layer start-session exchange on the
//! control channel, followed by a product request whose multi-packet reply
//! (product data, protocol array) is read from the bulk channel. After that
//! the bulk channel is a stream of application packets that callers filter
//! by id.

pub mod connection;
pub mod connector;
pub mod error;
pub mod handshake;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use connection::{DeviceConnection, SessionState};
pub use connector::{
    connect_all, connect_all_from, connect_all_with_config, select_device, ConnectConfig,
};
pub use error::{ProtocolError, Result};
pub use handshake::{
    handshake, handshake_with_config, request_product_info, start_session, DeviceSession,
    ProductInfo, SessionConfig,
};
pub use stream::{is_end_of_burst, wait_for_packet, PacketStream, StreamItem};
