// src/poller/mock.rs
//
// Test doubles for the serial transport shared by the poller tests.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::common::{
    frame::LineSettings,
    hal_traits::{DeviceInfo, PortEvent, ReceiveCallback, SerialBackend, SerialLink},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockIoError(pub &'static str);

#[derive(Default)]
struct WireState {
    devices: Vec<DeviceInfo>,
    deny_permission: bool,
    fail_open: bool,
    fail_writes: bool,
    fail_close: bool,
    permission_requests: usize,
    opened: Vec<(String, LineSettings)>,
    closed: usize,
    writes: Vec<Vec<u8>>,
    write_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    callback: Option<ReceiveCallback>,
}

/// Shared view of the fake hardware. Clones observe and steer the same state.
#[derive(Clone, Default)]
pub struct MockWire {
    state: Arc<Mutex<WireState>>,
}

impl MockWire {
    pub fn new() -> Self {
        Self::default()
    }

    /// A wire with one CH340 adapter attached.
    pub fn with_probe() -> Self {
        let wire = Self::new();
        wire.attach(ch340());
        wire
    }

    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.state.lock().unwrap()
    }

    pub fn link(&self) -> MockLink {
        MockLink { wire: self.clone() }
    }

    pub fn backend(&self) -> MockBackend {
        MockBackend { wire: self.clone() }
    }

    pub fn attach(&self, device: DeviceInfo) {
        self.lock().devices.push(device);
    }

    pub fn set_deny_permission(&self, deny: bool) {
        self.lock().deny_permission = deny;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.lock().fail_close = fail;
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Every later write is also sent here, so async tests can await requests.
    pub fn write_receiver(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().write_tx = Some(tx);
        rx
    }

    pub fn permission_requests(&self) -> usize {
        self.lock().permission_requests
    }

    pub fn opened(&self) -> Vec<(String, LineSettings)> {
        self.lock().opened.clone()
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    pub fn has_callback(&self) -> bool {
        self.lock().callback.is_some()
    }

    /// Plays `bytes` into the registered receive callback, as the hardware would.
    pub fn deliver(&self, bytes: &[u8]) {
        self.emit(PortEvent::Data(bytes.to_vec()));
    }

    /// Reports a fatal I/O error through the receive callback.
    pub fn fail(&self, message: &str) {
        self.emit(PortEvent::Error(message.to_string()));
    }

    fn emit(&self, event: PortEvent) {
        // Call outside the lock; the callback may re-enter the wire.
        let callback = self.lock().callback.clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }
}

pub struct MockLink {
    wire: MockWire,
}

impl SerialLink for MockLink {
    type Error = MockIoError;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.wire.lock();
        if state.fail_writes {
            return Err(MockIoError("write failed"));
        }
        state.writes.push(bytes.to_vec());
        if let Some(tx) = &state.write_tx {
            let _ = tx.send(bytes.to_vec());
        }
        Ok(())
    }

    fn register_receive_callback(&mut self, callback: ReceiveCallback) {
        self.wire.lock().callback = Some(callback);
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        let mut state = self.wire.lock();
        state.closed += 1;
        state.callback = None;
        if state.fail_close {
            Err(MockIoError("close failed"))
        } else {
            Ok(())
        }
    }
}

pub struct MockBackend {
    wire: MockWire,
}

impl SerialBackend for MockBackend {
    type Error = MockIoError;
    type Link = MockLink;

    fn list_candidate_devices(&mut self) -> Result<Vec<DeviceInfo>, Self::Error> {
        Ok(self.wire.lock().devices.clone())
    }

    fn request_permission(&mut self, _device: &DeviceInfo) -> bool {
        let mut state = self.wire.lock();
        state.permission_requests += 1;
        !state.deny_permission
    }

    fn open(&mut self, device: &DeviceInfo, settings: &LineSettings) -> Result<Self::Link, Self::Error> {
        let mut state = self.wire.lock();
        if state.fail_open {
            return Err(MockIoError("open failed"));
        }
        state.opened.push((device.name.clone(), *settings));
        Ok(self.wire.link())
    }
}

pub fn ch340() -> DeviceInfo {
    DeviceInfo {
        name: "/dev/ttyUSB0".into(),
        vendor_id: Some(0x1A86),
        product_id: Some(0x7523),
        cdc_class: false,
    }
}

pub fn webcam() -> DeviceInfo {
    DeviceInfo {
        name: "/dev/video0".into(),
        vendor_id: Some(0x046D),
        product_id: Some(0x0825),
        cdc_class: false,
    }
}
