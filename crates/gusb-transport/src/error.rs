use std::path::PathBuf;

/// Errors that can occur while moving bytes to or from a device.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device path could not be opened (missing, or held exclusively elsewhere).
    #[error("failed to open device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The driver reported a different byte count than was requested.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { expected: usize, written: usize },

    /// The underlying read reported failure.
    #[error("device read failed: {0}")]
    ReadFailed(std::io::Error),

    /// Any other I/O error reported by the device handle.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has already been closed.
    #[error("transport closed")]
    Closed,

    /// Device access is not implemented for this platform.
    #[error("unsupported platform: {0}")]
    Unsupported(&'static str),
}

/// Errors that can occur while enumerating attached devices.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The device information set for the interface class could not be retrieved.
    #[error("device interface class not found: {0}")]
    ClassNotFound(std::io::Error),

    /// Enumeration failed for a reason other than running out of members.
    #[error("device enumeration failed: {0}")]
    Enumeration(std::io::Error),

    /// The interface detail (device path) for a member could not be read.
    #[error("failed to read interface detail for member {index}: {source}")]
    InterfaceDetail {
        index: u32,
        source: std::io::Error,
    },

    /// A discovered device path could not be opened.
    #[error("failed to open discovered device {path}: {source}")]
    Open {
        path: PathBuf,
        source: TransportError,
    },

    /// Device enumeration is not implemented for this platform.
    #[error("unsupported platform: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, TransportError>;
