//! Raw device I/O for Garmin USB handhelds and base stations.
//!
//! This is the lowest layer of gusb. It knows nothing about packets:
//! - [`Transport`] moves bytes to and from one opened device and applies the
//!   USB framing rules (zero-length terminator writes, bounded bulk and
//!   control-channel reads).
//! - [`discovery`] finds attached devices by device-interface class and
//!   opens one [`Transport`] per device.
//! - [`DeviceIo`] is the platform seam. Windows has a production backend;
//!   `mock` (feature `mock`) provides a scripted device for tests.
//! - [`Canceller`] aborts a blocked read from another thread.

pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod platform;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(windows)]
pub mod windows;

pub use config::TransportConfig;
pub use device::{CancelIo, DeviceIo};
pub use discovery::{
    discover, discover_from, discover_with_config, DeviceEnumerator, DiscoveryConfig,
    OpenFailurePolicy, GARMIN_INTERFACE_GUID,
};
pub use error::{DiscoveryError, Result, TransportError};
pub use platform::{PlatformDevice, PlatformEnumerator};
pub use transport::{Canceller, Transport};
