use std::ffi::OsString;
use std::io;
use std::mem;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use windows_sys::core::GUID;
use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
    SetupDiGetDeviceInterfaceDetailW, DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO,
    SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W,
};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_INSUFFICIENT_BUFFER, ERROR_NOT_FOUND, ERROR_NO_MORE_ITEMS,
    GENERIC_READ, GENERIC_WRITE, HANDLE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_ATTRIBUTE_NORMAL, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::{CancelIoEx, DeviceIoControl};

use crate::device::{CancelIo, DeviceIo, IOCTL_ASYNC_IN, IOCTL_USB_PACKET_SIZE};
use crate::discovery::DeviceEnumerator;
use crate::error::{DiscoveryError, Result, TransportError};

fn is_invalid_handle<T>(handle: *mut T) -> bool {
    handle.is_null() || handle as isize == -1
}

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

/// A Garmin USB device handle opened through the Windows driver.
#[derive(Debug)]
pub struct UsbDevice {
    handle: HANDLE,
    shared: Arc<SharedHandle>,
    path: PathBuf,
}

/// Handle value visible to cancellers. Zero once the device is closed.
#[derive(Debug)]
struct SharedHandle {
    raw: Mutex<isize>,
}

impl CancelIo for SharedHandle {
    fn cancel(&self) -> io::Result<()> {
        let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
        if *raw == 0 {
            return Ok(());
        }
        // SAFETY: the lock keeps `close` from releasing the handle during the
        // call; a null OVERLAPPED cancels every request pending on it.
        let ok = unsafe { CancelIoEx(*raw as HANDLE, ptr::null()) };
        if ok == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(ERROR_NOT_FOUND as i32) {
                return Err(err);
            }
        }
        Ok(())
    }
}

// SAFETY: the handle is a kernel object handle owned exclusively by this value;
// Win32 file handles may be used from any thread.
unsafe impl Send for UsbDevice {}

impl UsbDevice {
    /// Open `path` for read/write with no sharing.
    pub fn open(path: &Path) -> Result<Self> {
        let wide = to_wide(path);

        // SAFETY: `wide` is a NUL-terminated UTF-16 string that outlives the call;
        // null security attributes and template handle are permitted.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                ptr::null_mut(),
            )
        };

        if is_invalid_handle(handle) {
            return Err(TransportError::Open {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }

        debug!(?path, "opened garmin usb device");
        Ok(Self {
            handle,
            shared: Arc::new(SharedHandle {
                raw: Mutex::new(handle as isize),
            }),
            path: path.to_path_buf(),
        })
    }

    /// The interface path this device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_control(&mut self, code: u32, out: *mut u8, out_len: usize) -> io::Result<usize> {
        let mut returned = 0u32;
        // SAFETY: `out` points to `out_len` writable bytes owned by the caller and
        // `returned` is a valid u32 out-parameter; the call is synchronous.
        let ok = unsafe {
            DeviceIoControl(
                self.handle,
                code,
                ptr::null(),
                0,
                out.cast(),
                out_len as u32,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(returned as usize)
    }
}

impl DeviceIo for UsbDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0u32;
        // SAFETY: `buf` is valid for `buf.len()` bytes and `written` is a valid
        // out-parameter; synchronous I/O so no OVERLAPPED is needed.
        let ok = unsafe {
            WriteFile(
                self.handle,
                buf.as_ptr(),
                buf.len() as u32,
                &mut written,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    fn read_bulk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read = 0u32;
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let ok = unsafe {
            ReadFile(
                self.handle,
                buf.as_mut_ptr(),
                buf.len() as u32,
                &mut read,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(read as usize)
    }

    fn read_async(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.io_control(IOCTL_ASYNC_IN, buf.as_mut_ptr(), buf.len())
    }

    fn query_packet_size(&mut self) -> io::Result<usize> {
        let mut size = [0u8; 4];
        self.io_control(IOCTL_USB_PACKET_SIZE, size.as_mut_ptr(), size.len())?;
        Ok(u32::from_le_bytes(size) as usize)
    }

    fn close(&mut self) -> io::Result<()> {
        if is_invalid_handle(self.handle) {
            return Ok(());
        }
        let mut raw = self
            .shared
            .raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *raw = 0;
        // SAFETY: the handle was returned by CreateFileW and is closed only here;
        // cancellers are locked out until it is gone.
        let ok = unsafe { CloseHandle(self.handle) };
        drop(raw);
        self.handle = ptr::null_mut();
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        debug!(path = ?self.path, "closed garmin usb device");
        Ok(())
    }

    fn canceller(&self) -> Arc<dyn CancelIo> {
        self.shared.clone()
    }
}

/// Enumerates present devices of one interface class through SetupAPI.
///
/// Owns the device information set and destroys it on drop.
pub struct SetupApiEnumerator {
    info_set: HDEVINFO,
    class: GUID,
}

impl SetupApiEnumerator {
    /// Retrieve the set of present devices exposing the `class` interface GUID.
    pub fn new(class: u128) -> std::result::Result<Self, DiscoveryError> {
        let class = GUID::from_u128(class);
        // SAFETY: `class` outlives the call; a null enumerator and parent window
        // are documented as valid.
        let info_set = unsafe {
            SetupDiGetClassDevsW(
                &class,
                ptr::null(),
                ptr::null_mut(),
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        };

        if is_invalid_handle(info_set) {
            return Err(DiscoveryError::ClassNotFound(io::Error::last_os_error()));
        }

        Ok(Self { info_set, class })
    }

    fn interface_data(
        &self,
        index: u32,
    ) -> std::result::Result<Option<SP_DEVICE_INTERFACE_DATA>, DiscoveryError> {
        // SAFETY: SP_DEVICE_INTERFACE_DATA is plain data; all-zero is a valid value.
        let mut data: SP_DEVICE_INTERFACE_DATA = unsafe { mem::zeroed() };
        data.cbSize = mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;

        // SAFETY: `info_set` is live for `self`; `class` and `data` are valid pointers.
        let ok = unsafe {
            SetupDiEnumDeviceInterfaces(self.info_set, ptr::null(), &self.class, index, &mut data)
        };
        if ok != 0 {
            return Ok(Some(data));
        }

        // SAFETY: reads the calling thread's last-error value.
        let code = unsafe { GetLastError() };
        if code == ERROR_NO_MORE_ITEMS {
            return Ok(None);
        }
        Err(DiscoveryError::Enumeration(io::Error::from_raw_os_error(code as i32)))
    }

    fn device_path(
        &self,
        index: u32,
        data: &SP_DEVICE_INTERFACE_DATA,
    ) -> std::result::Result<PathBuf, DiscoveryError> {
        let detail_err = |source| DiscoveryError::InterfaceDetail { index, source };

        let mut required = 0u32;
        // SAFETY: a null detail buffer with zero size asks only for the required size.
        let ok = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.info_set,
                data,
                ptr::null_mut(),
                0,
                &mut required,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            // SAFETY: reads the calling thread's last-error value.
            let code = unsafe { GetLastError() };
            if code != ERROR_INSUFFICIENT_BUFFER {
                return Err(detail_err(io::Error::from_raw_os_error(code as i32)));
            }
        }

        let path_offset = mem::offset_of!(SP_DEVICE_INTERFACE_DETAIL_DATA_W, DevicePath);
        let required = required as usize;
        if required <= path_offset {
            return Err(detail_err(io::Error::new(
                io::ErrorKind::InvalidData,
                "interface detail has no device path",
            )));
        }

        // u32 storage keeps the cbSize field aligned.
        let mut storage = vec![0u32; required.div_ceil(4)];
        let detail = storage
            .as_mut_ptr()
            .cast::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>();
        // SAFETY: `storage` holds at least `required` bytes; the write is unaligned-safe.
        unsafe {
            ptr::addr_of_mut!((*detail).cbSize)
                .write_unaligned(mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32);
        }

        // SAFETY: `detail` points to `required` writable bytes with cbSize set.
        let ok = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.info_set,
                data,
                detail,
                required as u32,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(detail_err(io::Error::last_os_error()));
        }

        let max_chars = (required - path_offset) / 2;
        // SAFETY: DevicePath starts at `path_offset` inside `storage` and spans at
        // most `max_chars` UTF-16 units; u16 alignment holds at that offset.
        let wide = unsafe {
            std::slice::from_raw_parts(
                storage.as_ptr().cast::<u8>().add(path_offset).cast::<u16>(),
                max_chars,
            )
        };
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        Ok(PathBuf::from(OsString::from_wide(&wide[..len])))
    }
}

impl DeviceEnumerator for SetupApiEnumerator {
    type Device = UsbDevice;

    fn interface_path(
        &mut self,
        index: u32,
    ) -> std::result::Result<Option<PathBuf>, DiscoveryError> {
        match self.interface_data(index)? {
            Some(data) => self.device_path(index, &data).map(Some),
            None => Ok(None),
        }
    }

    fn open(&mut self, path: &Path) -> Result<Self::Device> {
        UsbDevice::open(path)
    }
}

impl Drop for SetupApiEnumerator {
    fn drop(&mut self) {
        // SAFETY: `info_set` came from SetupDiGetClassDevsW and is destroyed only here.
        unsafe {
            SetupDiDestroyDeviceInfoList(self.info_set);
        }
    }
}
