// src/common/hal_traits.rs

use super::frame::LineSettings;
use core::fmt::Debug;
use std::sync::Arc;

/// A serial-capable device as reported by the platform's enumeration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceInfo {
    /// Platform name or path (`/dev/ttyUSB0`, `COM3`, ...).
    pub name: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// The device presents itself as a USB communications device (CDC-ACM).
    pub cdc_class: bool,
}

/// Decides whether an enumerated device is worth connecting to.
///
/// Device identification is a heuristic. Implement this to replace or extend
/// the default [`VendorAllowList`]; plain closures implement it too.
pub trait DeviceFilter: Send + Sync {
    fn matches(&self, device: &DeviceInfo) -> bool;
}

impl<F> DeviceFilter for F
where
    F: Fn(&DeviceInfo) -> bool + Send + Sync,
{
    fn matches(&self, device: &DeviceInfo) -> bool {
        self(device)
    }
}

/// Accepts common USB-to-serial chipset vendors, and optionally any CDC device.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VendorAllowList {
    pub vendor_ids: Vec<u16>,
    pub accept_cdc_class: bool,
}

impl VendorAllowList {
    /// FTDI, Prolific, Silicon Labs, WCH, Microchip, Arduino.
    pub const COMMON_BRIDGE_VENDORS: [u16; 6] = [0x0403, 0x067B, 0x10C4, 0x1A86, 0x04D8, 0x2341];
}

impl Default for VendorAllowList {
    fn default() -> Self {
        VendorAllowList {
            vendor_ids: Self::COMMON_BRIDGE_VENDORS.to_vec(),
            accept_cdc_class: true,
        }
    }
}

impl DeviceFilter for VendorAllowList {
    fn matches(&self, device: &DeviceInfo) -> bool {
        let vendor_known = device
            .vendor_id
            .is_some_and(|vid| self.vendor_ids.contains(&vid));
        vendor_known || (self.accept_cdc_class && device.cdc_class)
    }
}

/// Something that happened on an open port, delivered from the transport's
/// own execution context.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PortEvent {
    /// A chunk of received bytes, in arrival order.
    Data(Vec<u8>),
    /// Fatal I/O failure (cable pulled, device reset). No further events follow.
    Error(String),
}

/// Receive callback registered on an open port. May be invoked from any thread.
pub type ReceiveCallback = Arc<dyn Fn(PortEvent) + Send + Sync + 'static>;

/// An open serial port.
pub trait SerialLink: Send {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Hands a complete frame to the transport. Must not wait for a reply.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Installs the callback that receives bytes and fatal errors.
    /// Replaces any previously registered callback.
    fn register_receive_callback(&mut self, callback: ReceiveCallback);

    /// Releases the port. No events are delivered after this returns.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Platform access to serial devices: enumeration, permission and opening.
pub trait SerialBackend: Send {
    /// Associated error type for enumeration and open failures.
    type Error: Debug;

    /// The port type produced by [`SerialBackend::open`].
    type Link: SerialLink<Error = Self::Error>;

    /// Lists the serial-capable devices currently attached.
    fn list_candidate_devices(&mut self) -> Result<Vec<DeviceInfo>, Self::Error>;

    /// Asks the OS (or the user) for access to `device`. `false` means denied.
    fn request_permission(&mut self, device: &DeviceInfo) -> bool;

    /// Opens `device` with the given line parameters.
    fn open(&mut self, device: &DeviceInfo, settings: &LineSettings) -> Result<Self::Link, Self::Error>;
}
