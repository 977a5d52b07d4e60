use gusb_transport::{
    discover_from, platform, DeviceEnumerator, DeviceIo, DiscoveryConfig, PlatformDevice,
};
use tracing::{debug, info};

use crate::connection::DeviceConnection;
use crate::error::Result;
use crate::handshake::{DeviceSession, SessionConfig};

/// Configuration for [`connect_all_with_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectConfig {
    pub discovery: DiscoveryConfig,
    pub session: SessionConfig,
}

/// Discover every attached device and establish a session on each.
pub fn connect_all() -> Result<Vec<DeviceConnection<PlatformDevice>>> {
    connect_all_with_config(&ConnectConfig::default())
}

/// Discover and establish with explicit configuration.
pub fn connect_all_with_config(
    config: &ConnectConfig,
) -> Result<Vec<DeviceConnection<PlatformDevice>>> {
    let mut enumerator = platform::enumerator()?;
    connect_all_from(&mut enumerator, config)
}

/// Discover through `enumerator` and establish a session on each device.
///
/// A handshake failure on any device fails the call; every transport opened
/// so far is closed before the error is returned.
pub fn connect_all_from<E: DeviceEnumerator>(
    enumerator: &mut E,
    config: &ConnectConfig,
) -> Result<Vec<DeviceConnection<E::Device>>> {
    let transports = discover_from(enumerator, &config.discovery)?;

    let mut connections: Vec<DeviceConnection<E::Device>> = transports
        .into_iter()
        .map(|t| DeviceConnection::with_config(t, config.session.clone()))
        .collect();

    for (index, conn) in connections.iter_mut().enumerate() {
        if let Err(err) = conn.establish() {
            debug!(index, %err, "handshake failed; closing all devices");
            close_all(&mut connections);
            return Err(err);
        }
    }

    info!(devices = connections.len(), "all devices connected");
    Ok(connections)
}

/// Return the first established connection whose session satisfies
/// `predicate`, closing every other connection.
pub fn select_device<D, F>(
    connections: Vec<DeviceConnection<D>>,
    mut predicate: F,
) -> Option<DeviceConnection<D>>
where
    D: DeviceIo,
    F: FnMut(&DeviceSession) -> bool,
{
    let mut selected = None;
    for mut conn in connections {
        let matches = selected.is_none() && conn.session().is_some_and(&mut predicate);
        if matches {
            selected = Some(conn);
        } else if let Err(err) = conn.close() {
            debug!(%err, "failed to close unselected device");
        }
    }

    if let Some(session) = selected.as_ref().and_then(DeviceConnection::session) {
        info!(
            device_id = session.device_id,
            description = %session.description,
            "device selected"
        );
    }
    selected
}

fn close_all<D: DeviceIo>(connections: &mut [DeviceConnection<D>]) {
    for conn in connections {
        if let Err(err) = conn.close() {
            debug!(%err, "failed to close device");
        }
    }
}
