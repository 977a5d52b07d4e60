use bytes::{Buf, Bytes};
use gusb_packet::{decode_capability_list, decode_packet, ids, CapabilitySet, Packet};
use gusb_transport::{DeviceIo, Transport};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::{ProtocolError, Result};
use crate::stream::{PacketStream, StreamItem};

/// Bytes of product-data payload before the description text.
const PRODUCT_HEADER_SIZE: usize = 4;

/// Configuration for session establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Packet ids that let an end-of-burst marker end the product-info
    /// response. A marker read before any of these has arrived is skipped.
    pub terminal_packet_ids: Vec<i16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            terminal_packet_ids: vec![ids::PRODUCT_DATA, ids::PROTOCOL_ARRAY],
        }
    }
}

/// What a device reported about itself during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceSession {
    /// Unit id from the session-started reply.
    pub device_id: u32,
    /// Product id from the product-data record.
    pub product_id: u16,
    /// Software version from the product-data record.
    pub software_version: i16,
    /// Product description with NUL padding removed.
    pub description: String,
    /// Supported protocols and data types.
    pub capabilities: CapabilitySet,
}

/// Product-data fields, decoded leniently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInfo {
    pub product_id: u16,
    pub software_version: i16,
    pub description: String,
}

impl ProductInfo {
    /// Decode a product-data payload.
    ///
    /// A payload too short for the id and version fields yields zeros and an
    /// empty description. NUL bytes are dropped and non-ASCII bytes become `?`.
    pub fn from_payload(payload: &[u8]) -> Self {
        if payload.len() < PRODUCT_HEADER_SIZE {
            return Self::default();
        }

        let mut header = &payload[..PRODUCT_HEADER_SIZE];
        let product_id = header.get_u16_le();
        let software_version = header.get_i16_le();
        let description = payload[PRODUCT_HEADER_SIZE..]
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
            .collect();

        Self {
            product_id,
            software_version,
            description,
        }
    }
}

/// Perform the full handshake using default configuration.
pub fn handshake<D: DeviceIo>(transport: &mut Transport<D>) -> Result<DeviceSession> {
    handshake_with_config(transport, &SessionConfig::default())
}

/// Perform the full handshake using explicit configuration.
///
/// Either the whole session is returned or an error; nothing is retried.
pub fn handshake_with_config<D: DeviceIo>(
    transport: &mut Transport<D>,
    config: &SessionConfig,
) -> Result<DeviceSession> {
    let device_id = start_session(transport)?;
    let (product, capabilities) = request_product_info(transport, config)?;

    info!(
        device_id,
        product_id = product.product_id,
        description = %product.description,
        capabilities = capabilities.len(),
        "session established"
    );

    Ok(DeviceSession {
        device_id,
        product_id: product.product_id,
        software_version: product.software_version,
        description: product.description,
        capabilities,
    })
}

/// Send start-session and return the unit id from the session-started reply.
///
/// The reply arrives on the control channel, where a leading zero byte is
/// just the transport-layer kind and not a marker.
pub fn start_session<D: DeviceIo>(transport: &mut Transport<D>) -> Result<u32> {
    let request = Packet::transport(ids::START_SESSION).to_bytes()?;
    transport.write(&request)?;

    let reply = decode_packet(&transport.read_control_packet()?)?;
    if reply.id != ids::SESSION_STARTED {
        return Err(ProtocolError::UnexpectedPacket {
            expected: ids::SESSION_STARTED,
            got: reply.id,
        });
    }

    let mut payload = reply.payload.as_ref();
    if payload.len() < 4 {
        return Err(ProtocolError::ShortSessionPayload(payload.len()));
    }
    let device_id = payload.get_u32_le();
    debug!(device_id, "session started");
    Ok(device_id)
}

/// Send product-request and collect the response burst.
pub fn request_product_info<D: DeviceIo>(
    transport: &mut Transport<D>,
    config: &SessionConfig,
) -> Result<(ProductInfo, CapabilitySet)> {
    let request = Packet::application(ids::PRODUCT_REQUEST, Bytes::new()).to_bytes()?;
    transport.write(&request)?;

    let mut product = ProductInfo::default();
    let mut capabilities = CapabilitySet::default();
    let mut terminal_seen = false;

    let mut stream = PacketStream::new(transport);
    loop {
        let packet = match stream.next_item()? {
            StreamItem::EndOfBurst if terminal_seen => break,
            StreamItem::EndOfBurst => {
                trace!("end-of-burst before product info; continuing");
                continue;
            }
            StreamItem::Packet(packet) => packet,
        };

        if config.terminal_packet_ids.contains(&packet.id) {
            terminal_seen = true;
        }

        match packet.id {
            ids::PRODUCT_DATA => product = ProductInfo::from_payload(&packet.payload),
            ids::EXT_PRODUCT_DATA => {}
            ids::PROTOCOL_ARRAY => {
                capabilities =
                    CapabilitySet::from_descriptors(decode_capability_list(&packet.payload)?);
            }
            other => warn!(
                id = other,
                "ignoring unexpected packet in product info burst"
            ),
        }
    }

    Ok((product, capabilities))
}
