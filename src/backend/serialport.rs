// src/backend/serialport.rs

//! Desktop transport built on the `serialport` crate.
//!
//! Received bytes are read on a dedicated thread and forwarded to the
//! registered callback, which is how the engine expects a transport to behave.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ::serialport::{
    DataBits as SpDataBits, Error, ErrorKind, Parity as SpParity, SerialPort, SerialPortInfo,
    SerialPortType, StopBits as SpStopBits,
};
use tracing::{debug, warn};

use crate::common::{
    frame::{LineSettings, Parity, StopBits},
    hal_traits::{DeviceInfo, PortEvent, ReceiveCallback, SerialBackend, SerialLink},
    response::MAX_ADU_LEN,
    timing::READER_POLL,
};

/// Enumerates and opens local serial ports.
///
/// The OS enforces access when the port is opened, so `request_permission`
/// always grants.
#[derive(Debug, Default)]
pub struct SerialPortBackend;

impl SerialPortBackend {
    pub fn new() -> Self {
        SerialPortBackend
    }
}

impl SerialBackend for SerialPortBackend {
    type Error = Error;
    type Link = SerialPortLink;

    fn list_candidate_devices(&mut self) -> Result<Vec<DeviceInfo>, Error> {
        let ports = ::serialport::available_ports()?;
        Ok(ports.into_iter().map(device_info).collect())
    }

    fn request_permission(&mut self, _device: &DeviceInfo) -> bool {
        true
    }

    fn open(&mut self, device: &DeviceInfo, settings: &LineSettings) -> Result<SerialPortLink, Error> {
        let port = ::serialport::new(device.name.as_str(), settings.baud_rate)
            .data_bits(data_bits(settings.data_bits)?)
            .stop_bits(match settings.stop_bits {
                StopBits::One => SpStopBits::One,
                StopBits::Two => SpStopBits::Two,
            })
            .parity(match settings.parity {
                Parity::None => SpParity::None,
                Parity::Even => SpParity::Even,
                Parity::Odd => SpParity::Odd,
            })
            .timeout(READER_POLL)
            .open()?;
        debug!(port = %device.name, %settings, "port opened");
        Ok(SerialPortLink { port, reader: None })
    }
}

fn device_info(port: SerialPortInfo) -> DeviceInfo {
    // Linux names CDC-ACM devices ttyACM*; other platforms give no hint.
    let cdc_class = port.port_name.contains("ttyACM");
    match port.port_type {
        SerialPortType::UsbPort(usb) => DeviceInfo {
            name: port.port_name,
            vendor_id: Some(usb.vid),
            product_id: Some(usb.pid),
            cdc_class,
        },
        _ => DeviceInfo {
            name: port.port_name,
            vendor_id: None,
            product_id: None,
            cdc_class,
        },
    }
}

fn data_bits(bits: u8) -> Result<SpDataBits, Error> {
    match bits {
        5 => Ok(SpDataBits::Five),
        6 => Ok(SpDataBits::Six),
        7 => Ok(SpDataBits::Seven),
        8 => Ok(SpDataBits::Eight),
        other => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("unsupported data bits: {}", other),
        )),
    }
}

struct Reader {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// An open port plus its reader thread.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    reader: Option<Reader>,
}

impl SerialPortLink {
    /// Signals the reader thread and waits for it. Returns `false` if it panicked.
    fn stop_reader(&mut self) -> bool {
        let Some(reader) = self.reader.take() else {
            return true;
        };
        reader.stop.store(true, Ordering::Release);
        reader.thread.join().is_ok()
    }
}

impl SerialLink for SerialPortLink {
    type Error = Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn register_receive_callback(&mut self, callback: ReceiveCallback) {
        self.stop_reader();

        let port = match self.port.try_clone() {
            Ok(port) => port,
            Err(e) => {
                callback(PortEvent::Error(e.to_string()));
                return;
            }
        };
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name("soil-probe-rx".into())
            .spawn({
                let callback = Arc::clone(&callback);
                move || read_loop(port, thread_stop, callback)
            });
        match spawned {
            Ok(thread) => self.reader = Some(Reader { stop, thread }),
            Err(e) => callback(PortEvent::Error(e.to_string())),
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.stop_reader() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Unknown, "reader thread panicked"))
        }
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, stop: Arc<AtomicBool>, callback: ReceiveCallback) {
    let mut buf = [0u8; MAX_ADU_LEN];
    while !stop.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => callback(PortEvent::Data(buf[..n].to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => {
                if !stop.load(Ordering::Acquire) {
                    warn!(error = %e, "serial read failed");
                    callback(PortEvent::Error(e.to_string()));
                }
                break;
            }
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use ::serialport::UsbPortInfo;

    #[test]
    fn test_usb_port_info() {
        let info = device_info(SerialPortInfo {
            port_name: "/dev/ttyUSB0".into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x1A86,
                pid: 0x7523,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        });
        assert_eq!(info.vendor_id, Some(0x1A86));
        assert_eq!(info.product_id, Some(0x7523));
        assert!(!info.cdc_class);
    }

    #[test]
    fn test_acm_port_is_cdc() {
        let info = device_info(SerialPortInfo {
            port_name: "/dev/ttyACM0".into(),
            port_type: SerialPortType::Unknown,
        });
        assert!(info.cdc_class);
        assert_eq!(info.vendor_id, None);
    }

    #[test]
    fn test_data_bits() {
        assert_eq!(data_bits(8).unwrap(), SpDataBits::Eight);
        assert!(data_bits(9).is_err());
    }
}
