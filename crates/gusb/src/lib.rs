//! Garmin USB device protocol stack.
//!
//! Talks to Garmin handhelds and base stations attached through the vendor
//! USB driver: finds them, performs the session handshake, and reads the
//! application packet stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: device I/O, USB write framing, device discovery
//! - [`packet`]: 12-byte packet envelope and capability descriptors
//! - [`session`]: handshake state machine and packet stream reader
//!
//! ```no_run
//! use gusb::session::{connect_all, select_device};
//!
//! let devices = connect_all()?;
//! if let Some(mut base) = select_device(devices, |s| s.capabilities.supports_application(1100)) {
//!     let packet = base.wait_for_packet(3078)?;
//!     println!("{} bytes", packet.payload_size());
//! }
//! # Ok::<(), gusb::session::ProtocolError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use gusb_transport::*;
}

/// Re-export packet codec types.
pub mod packet {
    pub use gusb_packet::*;
}

/// Re-export session types.
pub mod session {
    pub use gusb_session::*;
}
