//! Platform backend selection.
//!
//! Windows talks to the Garmin USB driver through SetupAPI and
//! `DeviceIoControl`. Other platforms compile against an uninhabited device
//! type whose enumerator reports [`DiscoveryError::Unsupported`], so the
//! protocol stack and its tests build everywhere.

use std::path::Path;

use crate::error::{DiscoveryError, Result};

#[cfg(windows)]
pub use crate::windows::{SetupApiEnumerator as PlatformEnumerator, UsbDevice as PlatformDevice};

#[cfg(not(windows))]
pub use self::unsupported::{
    UnsupportedDevice as PlatformDevice, UnsupportedEnumerator as PlatformEnumerator,
};

/// Open a device path with the platform backend.
pub fn open_device(path: &Path) -> Result<PlatformDevice> {
    #[cfg(windows)]
    {
        PlatformDevice::open(path)
    }

    #[cfg(not(windows))]
    {
        let _ = path;
        Err(crate::error::TransportError::Unsupported(unsupported::REASON))
    }
}

/// Create the platform enumerator for the Garmin device interface class.
pub fn enumerator() -> std::result::Result<PlatformEnumerator, DiscoveryError> {
    #[cfg(windows)]
    {
        PlatformEnumerator::new(crate::discovery::GARMIN_INTERFACE_GUID)
    }

    #[cfg(not(windows))]
    {
        Err(DiscoveryError::Unsupported(unsupported::REASON))
    }
}

#[cfg(not(windows))]
mod unsupported {
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::device::{CancelIo, DeviceIo};
    use crate::discovery::DeviceEnumerator;
    use crate::error::{DiscoveryError, TransportError};

    pub(super) const REASON: &str = "Garmin USB device access requires the Windows driver";

    /// Device type on platforms without a backend. It has no values.
    #[derive(Debug)]
    pub enum UnsupportedDevice {}

    impl DeviceIo for UnsupportedDevice {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            match *self {}
        }

        fn read_bulk(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            match *self {}
        }

        fn read_async(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            match *self {}
        }

        fn query_packet_size(&mut self) -> io::Result<usize> {
            match *self {}
        }

        fn close(&mut self) -> io::Result<()> {
            match *self {}
        }

        fn canceller(&self) -> Arc<dyn CancelIo> {
            match *self {}
        }
    }

    /// Enumerator on platforms without a backend; every call fails.
    #[derive(Debug, Default)]
    pub struct UnsupportedEnumerator;

    impl DeviceEnumerator for UnsupportedEnumerator {
        type Device = UnsupportedDevice;

        fn interface_path(&mut self, _index: u32) -> Result<Option<PathBuf>, DiscoveryError> {
            Err(DiscoveryError::Unsupported(REASON))
        }

        fn open(&mut self, _path: &Path) -> Result<Self::Device, TransportError> {
            Err(TransportError::Unsupported(REASON))
        }
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn open_reports_unsupported_platform() {
        let result = open_device(Path::new("/dev/null"));
        assert!(matches!(result, Err(TransportError::Unsupported(_))));
    }

    #[test]
    fn enumerator_reports_unsupported_platform() {
        assert!(matches!(enumerator(), Err(DiscoveryError::Unsupported(_))));
    }
}
