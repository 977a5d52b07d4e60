use gusb_packet::Packet;
use gusb_transport::{Canceller, DeviceIo, Transport};
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::handshake::{handshake_with_config, DeviceSession, SessionConfig};
use crate::stream::PacketStream;

/// Whether a connection has completed its handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    NotEstablished,
    Established(DeviceSession),
}

/// One device connection: an open transport plus its session state.
///
/// The handshake runs at most once. After it fails the connection stays
/// `NotEstablished` and should be closed; the device only recovers from a
/// fresh open.
pub struct DeviceConnection<D: DeviceIo> {
    transport: Transport<D>,
    state: SessionState,
    config: SessionConfig,
}

impl<D: DeviceIo> DeviceConnection<D> {
    /// Wrap an open transport with default session configuration.
    pub fn new(transport: Transport<D>) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Wrap an open transport with explicit session configuration.
    pub fn with_config(transport: Transport<D>, config: SessionConfig) -> Self {
        Self {
            transport,
            state: SessionState::NotEstablished,
            config,
        }
    }

    /// Run the handshake if it has not run yet and return the session.
    pub fn establish(&mut self) -> Result<&DeviceSession> {
        if !self.is_established() {
            let session = handshake_with_config(&mut self.transport, &self.config)?;
            self.state = SessionState::Established(session);
        }
        self.session().ok_or(ProtocolError::NotEstablished)
    }

    pub fn session(&self) -> Option<&DeviceSession> {
        match &self.state {
            SessionState::Established(session) => Some(session),
            SessionState::NotEstablished => None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Established(_))
    }

    /// Packet stream over the bulk channel. Requires an established session.
    pub fn stream(&mut self) -> Result<PacketStream<'_, D>> {
        if !self.is_established() {
            return Err(ProtocolError::NotEstablished);
        }
        Ok(PacketStream::new(&mut self.transport))
    }

    /// Block until a packet with `expected_id` arrives.
    pub fn wait_for_packet(&mut self, expected_id: i16) -> Result<Packet> {
        self.stream()?.wait_for_packet(expected_id)
    }

    pub fn transport(&self) -> &Transport<D> {
        &self.transport
    }

    /// Handle that aborts a blocked [`wait_for_packet`](Self::wait_for_packet)
    /// from another thread. The aborted call returns a read failure.
    pub fn canceller(&self) -> Canceller {
        self.transport.canceller()
    }

    /// Release the device handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()?;
        debug!(
            established = self.is_established(),
            "device connection closed"
        );
        Ok(())
    }

    /// Consume the connection and return the transport.
    pub fn into_transport(self) -> Transport<D> {
        self.transport
    }
}

impl<D: DeviceIo> std::fmt::Debug for DeviceConnection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .finish()
    }
}
