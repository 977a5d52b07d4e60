use bytes::{BufMut, BytesMut};
use gusb_packet::{encode_capability_list, ids, CapabilityDescriptor, Packet, PacketKind};
use gusb_transport::mock::MockDevice;

pub(crate) fn wire(kind: PacketKind, id: i16, payload: &[u8]) -> Vec<u8> {
    Packet::new(kind, id, payload.to_vec())
        .to_bytes()
        .expect("test packet should encode")
        .to_vec()
}

pub(crate) fn app(id: i16, payload: &[u8]) -> Vec<u8> {
    wire(PacketKind::Application, id, payload)
}

pub(crate) fn session_started(device_id: u32) -> Vec<u8> {
    wire(
        PacketKind::Transport,
        ids::SESSION_STARTED,
        &device_id.to_le_bytes(),
    )
}

pub(crate) fn product_data(product_id: u16, software_version: i16, text: &[u8]) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u16_le(product_id);
    payload.put_i16_le(software_version);
    payload.put_slice(text);
    app(ids::PRODUCT_DATA, &payload)
}

pub(crate) fn protocol_array(caps: &[&str]) -> Vec<u8> {
    let descriptors: Vec<CapabilityDescriptor> = caps
        .iter()
        .map(|c| c.parse().expect("test capability should parse"))
        .collect();
    let mut payload = BytesMut::new();
    encode_capability_list(&descriptors, &mut payload);
    app(ids::PROTOCOL_ARRAY, &payload)
}

/// End-of-burst marker as the driver delivers it: a buffer led by a zero byte.
pub(crate) fn end_marker() -> Vec<u8> {
    vec![0; 12]
}

/// A device scripted to complete a full handshake.
pub(crate) fn handshaking_device(device_id: u32, description: &str, caps: &[&str]) -> MockDevice {
    let device = MockDevice::new();
    device.push_async(session_started(device_id));
    let mut text = description.as_bytes().to_vec();
    text.push(0);
    device.push_bulk(product_data(1, 100, &text));
    device.push_bulk(protocol_array(caps));
    device.push_bulk(end_marker());
    device
}
