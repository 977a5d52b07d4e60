//! Enumeration of attached Garmin USB devices.
//!
//! Devices are found through their device-interface class. The platform
//! enumerator yields one interface path per member index until it reports
//! "no more items"; each path is opened into a [`Transport`] with its packet
//! size already negotiated.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::device::DeviceIo;
use crate::error::{DiscoveryError, TransportError};
use crate::platform::{self, PlatformDevice};
use crate::transport::Transport;

/// Device-interface class GUID of the Garmin USB driver,
/// `{2C9C45C2-8E7D-4C08-A12D-816BBAE722C0}`.
pub const GARMIN_INTERFACE_GUID: u128 = 0x2C9C45C2_8E7D_4C08_A12D_816BBAE722C0;

/// Source of device-interface paths for one interface class.
pub trait DeviceEnumerator {
    /// Device handle type produced by [`open`](Self::open).
    type Device: DeviceIo;

    /// Interface path of member `index`, or `Ok(None)` once the platform
    /// reports that there are no more members.
    fn interface_path(&mut self, index: u32) -> Result<Option<PathBuf>, DiscoveryError>;

    /// Open one interface path exclusively.
    fn open(&mut self, path: &Path) -> Result<Self::Device, TransportError>;
}

/// What discovery does when one discovered path fails to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenFailurePolicy {
    /// Fail the whole discovery; transports already opened are closed.
    #[default]
    Abort,
    /// Log the failure and continue with the next member.
    Skip,
}

/// Configuration for device discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Configuration applied to every opened transport.
    pub transport: TransportConfig,
    /// Handling of devices that are present but cannot be opened.
    pub on_open_failure: OpenFailurePolicy,
}

/// Discover every present Garmin USB device using default configuration.
pub fn discover() -> Result<Vec<Transport<PlatformDevice>>, DiscoveryError> {
    discover_with_config(&DiscoveryConfig::default())
}

/// Discover every present Garmin USB device using explicit configuration.
pub fn discover_with_config(
    config: &DiscoveryConfig,
) -> Result<Vec<Transport<PlatformDevice>>, DiscoveryError> {
    let mut enumerator = platform::enumerator()?;
    discover_from(&mut enumerator, config)
}

/// Run discovery against any enumerator.
///
/// Output order is enumeration order. An enumeration failure fails the
/// whole call; a device that fails to open is handled per
/// `config.on_open_failure`.
pub fn discover_from<E: DeviceEnumerator>(
    enumerator: &mut E,
    config: &DiscoveryConfig,
) -> Result<Vec<Transport<E::Device>>, DiscoveryError> {
    let mut transports = Vec::new();
    let mut index = 0u32;

    while let Some(path) = enumerator.interface_path(index)? {
        debug!(index, ?path, "found device interface");

        match enumerator.open(&path) {
            Ok(device) => {
                transports.push(Transport::from_device_with_config(device, config.transport));
            }
            Err(err) => match config.on_open_failure {
                OpenFailurePolicy::Abort => {
                    return Err(DiscoveryError::Open { path, source: err });
                }
                OpenFailurePolicy::Skip => {
                    warn!(?path, %err, "skipping device that failed to open");
                }
            },
        }

        index = index.saturating_add(1);
    }

    info!(devices = transports.len(), "device discovery complete");
    Ok(transports)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::ErrorKind;

    use super::*;
    use crate::mock::MockDevice;

    enum Member {
        Device(MockDevice),
        Unopenable,
    }

    struct ScriptedEnumerator {
        members: Vec<Member>,
        failure_at: Option<u32>,
        requested: VecDeque<u32>,
    }

    impl ScriptedEnumerator {
        fn new(members: Vec<Member>) -> Self {
            Self {
                members,
                failure_at: None,
                requested: VecDeque::new(),
            }
        }
    }

    impl DeviceEnumerator for ScriptedEnumerator {
        type Device = MockDevice;

        fn interface_path(&mut self, index: u32) -> Result<Option<PathBuf>, DiscoveryError> {
            self.requested.push_back(index);
            if self.failure_at == Some(index) {
                return Err(DiscoveryError::Enumeration(std::io::Error::from(
                    ErrorKind::Other,
                )));
            }
            if (index as usize) < self.members.len() {
                Ok(Some(PathBuf::from(format!("garmin#{index}"))))
            } else {
                Ok(None)
            }
        }

        fn open(&mut self, path: &Path) -> Result<Self::Device, TransportError> {
            let index: usize = path
                .to_string_lossy()
                .trim_start_matches("garmin#")
                .parse()
                .map_err(|_| TransportError::Closed)?;
            match &self.members[index] {
                Member::Device(device) => Ok(device.clone()),
                Member::Unopenable => Err(TransportError::Open {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(ErrorKind::PermissionDenied),
                }),
            }
        }
    }

    #[test]
    fn no_more_items_ends_enumeration_without_error() {
        let mut enumerator = ScriptedEnumerator::new(vec![
            Member::Device(MockDevice::new().with_packet_size(64)),
            Member::Device(MockDevice::new().with_packet_size(512)),
        ]);

        let transports = discover_from(&mut enumerator, &DiscoveryConfig::default()).unwrap();

        assert_eq!(transports.len(), 2);
        assert!(transports.iter().all(Transport::is_open));
        assert_eq!(transports[0].negotiated_packet_size(), 64);
        assert_eq!(transports[1].negotiated_packet_size(), 512);
        assert_eq!(enumerator.requested, VecDeque::from(vec![0, 1, 2]));
    }

    #[test]
    fn empty_enumeration_returns_no_devices() {
        let mut enumerator = ScriptedEnumerator::new(Vec::new());
        let transports = discover_from(&mut enumerator, &DiscoveryConfig::default()).unwrap();
        assert!(transports.is_empty());
    }

    #[test]
    fn enumeration_failure_is_fatal_and_closes_opened_devices() {
        let first = MockDevice::new();
        let mut enumerator = ScriptedEnumerator::new(vec![
            Member::Device(first.clone()),
            Member::Device(MockDevice::new()),
        ]);
        enumerator.failure_at = Some(1);

        let result = discover_from(&mut enumerator, &DiscoveryConfig::default());

        assert!(matches!(result, Err(DiscoveryError::Enumeration(_))));
        assert_eq!(first.close_count(), 1);
    }

    #[test]
    fn open_failure_aborts_by_default() {
        let first = MockDevice::new();
        let mut enumerator = ScriptedEnumerator::new(vec![
            Member::Device(first.clone()),
            Member::Unopenable,
            Member::Device(MockDevice::new()),
        ]);

        let result = discover_from(&mut enumerator, &DiscoveryConfig::default());

        assert!(matches!(result, Err(DiscoveryError::Open { .. })));
        assert_eq!(first.close_count(), 1);
        assert_eq!(enumerator.requested, VecDeque::from(vec![0, 1]));
    }

    #[test]
    fn open_failure_skipped_when_configured() {
        let mut enumerator = ScriptedEnumerator::new(vec![
            Member::Device(MockDevice::new()),
            Member::Unopenable,
            Member::Device(MockDevice::new()),
        ]);
        let cfg = DiscoveryConfig {
            on_open_failure: OpenFailurePolicy::Skip,
            ..DiscoveryConfig::default()
        };

        let transports = discover_from(&mut enumerator, &cfg).unwrap();
        assert_eq!(transports.len(), 2);
    }

    #[test]
    fn applies_transport_config_to_each_device() {
        let mut enumerator =
            ScriptedEnumerator::new(vec![Member::Device(MockDevice::new().without_packet_size())]);
        let cfg = DiscoveryConfig {
            transport: TransportConfig {
                default_packet_size: 128,
                ..TransportConfig::default()
            },
            ..DiscoveryConfig::default()
        };

        let transports = discover_from(&mut enumerator, &cfg).unwrap();
        assert_eq!(transports[0].negotiated_packet_size(), 128);
    }

    #[test]
    fn garmin_guid_matches_driver_class() {
        assert_eq!(
            format!("{GARMIN_INTERFACE_GUID:032X}"),
            "2C9C45C28E7D4C08A12D816BBAE722C0"
        );
    }
}
