// src/poller/connection.rs

use core::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::transaction::{Resolution, TransactionController};
use crate::common::{
    error::ProbeError,
    frame::LineSettings,
    hal_traits::{DeviceFilter, DeviceInfo, PortEvent, SerialBackend, SerialLink},
    types::{ConnectionStatus, DisconnectReason},
};

/// Identifies one opened port. Events tagged with an older id belong to a
/// port that has since been closed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Receives everything the connection manager reports upward.
///
/// `port_event` is called from the transport's own thread; `status_changed`
/// from whoever drives the manager.
pub trait LinkObserver: Send + Sync {
    fn port_event(&self, link: LinkId, event: PortEvent);
    fn status_changed(&self, status: ConnectionStatus);
}

/// What a discovery pass achieved.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ScanOutcome {
    /// No attached device passed the filter.
    NoDevice,
    /// A link was already open; nothing was touched.
    AlreadyConnected,
    /// A new link is open to this device.
    Connected(DeviceInfo),
}

enum ConnectionState<L> {
    Disconnected,
    AwaitingPermission {
        device: DeviceInfo,
    },
    Connected {
        link_id: LinkId,
        device: DeviceInfo,
        port: L,
    },
}

impl<L> ConnectionState<L> {
    fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::AwaitingPermission { .. } => ConnectionStatus::AwaitingPermission,
            ConnectionState::Connected { .. } => ConnectionStatus::Connected,
        }
    }
}

/// Sole owner of the serial link and its status.
pub struct ConnectionManager<B: SerialBackend> {
    backend: B,
    filter: Box<dyn DeviceFilter>,
    settings: LineSettings,
    observer: Arc<dyn LinkObserver>,
    state: ConnectionState<B::Link>,
    next_link: u64,
}

impl<B: SerialBackend> ConnectionManager<B> {
    pub fn new(
        backend: B,
        filter: Box<dyn DeviceFilter>,
        settings: LineSettings,
        observer: Arc<dyn LinkObserver>,
    ) -> Self {
        ConnectionManager {
            backend,
            filter,
            settings,
            observer,
            state: ConnectionState::Disconnected,
            next_link: 1,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    /// Device currently being connected to or connected.
    pub fn device(&self) -> Option<&DeviceInfo> {
        match &self.state {
            ConnectionState::Disconnected => None,
            ConnectionState::AwaitingPermission { device } => Some(device),
            ConnectionState::Connected { device, .. } => Some(device),
        }
    }

    /// Id of the open link, if any.
    pub fn current_link(&self) -> Option<LinkId> {
        match &self.state {
            ConnectionState::Connected { link_id, .. } => Some(*link_id),
            _ => None,
        }
    }

    /// The open port, for issuing requests.
    pub fn link_mut(&mut self) -> Option<&mut B::Link> {
        match &mut self.state {
            ConnectionState::Connected { port, .. } => Some(port),
            _ => None,
        }
    }

    /// Finds a compatible adapter and opens it.
    ///
    /// Idempotent while connected. Absence of a device is a normal outcome, not
    /// an error.
    ///
    /// # Returns
    ///
    /// * `Ok(ScanOutcome)` describing what happened.
    /// * `Err(ProbeError::PermissionDenied)` if access was refused; status is
    ///   back to `Disconnected`.
    /// * `Err(ProbeError::Io)` if enumeration or opening failed; status is
    ///   back to `Disconnected`.
    pub fn scan_and_connect(&mut self) -> Result<ScanOutcome, ProbeError<B::Error>> {
        if self.is_connected() {
            return Ok(ScanOutcome::AlreadyConnected);
        }

        let devices = self.backend.list_candidate_devices().map_err(ProbeError::Io)?;
        let Some(device) = devices.into_iter().find(|d| self.filter.matches(d)) else {
            debug!("no compatible serial adapter attached");
            return Ok(ScanOutcome::NoDevice);
        };

        self.set_state(ConnectionState::AwaitingPermission { device: device.clone() });
        if !self.backend.request_permission(&device) {
            info!(device = %device.name, "permission denied");
            self.set_state(ConnectionState::Disconnected);
            return Err(ProbeError::PermissionDenied);
        }

        let mut port = match self.backend.open(&device, &self.settings) {
            Ok(port) => port,
            Err(e) => {
                warn!(device = %device.name, error = ?e, "failed to open serial port");
                self.set_state(ConnectionState::Disconnected);
                return Err(ProbeError::Io(e));
            }
        };

        let link_id = LinkId(self.next_link);
        self.next_link += 1;
        let observer = Arc::clone(&self.observer);
        port.register_receive_callback(Arc::new(move |event| observer.port_event(link_id, event)));

        info!(device = %device.name, %link_id, settings = %self.settings, "serial link open");
        self.set_state(ConnectionState::Connected { link_id, device: device.clone(), port });
        Ok(ScanOutcome::Connected(device))
    }

    /// Tears the link down.
    ///
    /// Any transaction in flight is aborted first, then the port is closed.
    /// Close errors are logged and swallowed; status always ends `Disconnected`.
    pub fn disconnect(
        &mut self,
        reason: &DisconnectReason,
        transactions: &mut TransactionController,
        now: Instant,
    ) -> Option<Resolution> {
        let aborted = transactions.abort(reason.abort_outcome(), now);

        let previous = core::mem::replace(&mut self.state, ConnectionState::Disconnected);
        match previous {
            ConnectionState::Connected { link_id, device, mut port } => {
                if let Err(e) = port.close() {
                    warn!(%link_id, device = %device.name, error = ?e, "error closing serial port (ignored)");
                }
                info!(%link_id, device = %device.name, %reason, "serial link closed");
                self.observer.status_changed(ConnectionStatus::Disconnected);
            }
            ConnectionState::AwaitingPermission { .. } => {
                self.observer.status_changed(ConnectionStatus::Disconnected);
            }
            ConnectionState::Disconnected => {}
        }

        aborted
    }

    /// Reacts to a fatal error reported by the transport.
    ///
    /// Errors from a link that is no longer current are ignored.
    pub fn on_transport_error(
        &mut self,
        link: LinkId,
        message: String,
        transactions: &mut TransactionController,
        now: Instant,
    ) -> Option<Resolution> {
        if self.current_link() != Some(link) {
            debug!(%link, "ignoring error from a closed link");
            return None;
        }
        warn!(%link, error = %message, "transport error");
        self.disconnect(&DisconnectReason::TransportError(message), transactions, now)
    }

    fn set_state(&mut self, state: ConnectionState<B::Link>) {
        let before = self.state.status();
        self.state = state;
        let after = self.state.status();
        if before != after {
            self.observer.status_changed(after);
        }
    }
}

impl<B: SerialBackend> Drop for ConnectionManager<B> {
    fn drop(&mut self) {
        if let ConnectionState::Connected { port, .. } = &mut self.state {
            let _ = port.close();
        }
    }
}
