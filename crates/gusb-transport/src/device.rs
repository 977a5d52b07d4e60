use std::io;
use std::sync::Arc;

/// `FILE_DEVICE_UNKNOWN` device type used by the Garmin USB driver.
pub const FILE_DEVICE_UNKNOWN: u32 = 0x0000_0022;
/// `METHOD_BUFFERED` transfer type.
pub const METHOD_BUFFERED: u32 = 0;
/// `FILE_ANY_ACCESS` access check.
pub const FILE_ANY_ACCESS: u32 = 0;

/// Build a device I/O control code (the `CTL_CODE` macro).
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Control code reading one packet from the async (interrupt) channel.
pub const IOCTL_ASYNC_IN: u32 =
    ctl_code(FILE_DEVICE_UNKNOWN, 0x850, METHOD_BUFFERED, FILE_ANY_ACCESS);

/// Control code returning the negotiated USB packet size.
pub const IOCTL_USB_PACKET_SIZE: u32 =
    ctl_code(FILE_DEVICE_UNKNOWN, 0x851, METHOD_BUFFERED, FILE_ANY_ACCESS);

/// Aborts reads pending on a device from another thread.
///
/// A cancelled read returns an error from the blocked [`DeviceIo`] call.
/// Cancelling a device with nothing in flight is not an error.
pub trait CancelIo: Send + Sync {
    fn cancel(&self) -> io::Result<()>;
}

/// Raw operations an opened Garmin USB device handle provides.
///
/// This is the seam between the protocol stack and the operating system.
/// [`Transport`](crate::Transport) layers the framing rules on top; tests
/// substitute scripted devices.
pub trait DeviceIo {
    /// Write `buf` (possibly empty) and return the byte count the driver reports.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read from the bulk data channel.
    fn read_bulk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Read from the async/interrupt channel (`IOCTL_ASYNC_IN`).
    fn read_async(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Query the negotiated USB packet size (`IOCTL_USB_PACKET_SIZE`).
    fn query_packet_size(&mut self) -> io::Result<usize>;

    /// Release the OS handle. Called at most once by [`Transport`](crate::Transport).
    fn close(&mut self) -> io::Result<()>;

    /// Handle that other threads use to abort a blocked read.
    fn canceller(&self) -> Arc<dyn CancelIo>;
}
