// src/common/types.rs

use chrono::{DateTime, Local};
use core::fmt;
use serde::{Deserialize, Serialize};

// --- Sensor Reading ---

/// One complete set of probe values.
///
/// All six channels come from a single CRC-valid response; a reading with a
/// missing channel is never constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Wall-clock capture time (local).
    pub timestamp: DateTime<Local>,
    /// Register 0, signed, ÷ 10.
    pub temperature_c: f32,
    /// Register 1, ÷ 10.
    pub humidity_pct: f32,
    /// Register 2, ÷ 100.
    pub ph: f32,
    /// Register 3, raw mg/kg.
    pub nitrogen_ppm: u16,
    /// Register 4, raw mg/kg.
    pub phosphorus_ppm: u16,
    /// Register 5, raw mg/kg.
    pub potassium_ppm: u16,
}

impl SensorReading {
    /// Number of holding registers that make up one reading.
    pub const REGISTER_COUNT: usize = 6;

    /// Scales the six raw registers into a reading.
    pub fn from_registers(registers: [u16; Self::REGISTER_COUNT], timestamp: DateTime<Local>) -> Self {
        let [temperature, humidity, ph, nitrogen, phosphorus, potassium] = registers;
        SensorReading {
            timestamp,
            temperature_c: f32::from(temperature as i16) / 10.0,
            humidity_pct: f32::from(humidity) / 10.0,
            ph: f32::from(ph) / 100.0,
            nitrogen_ppm: nitrogen,
            phosphorus_ppm: phosphorus,
            potassium_ppm: potassium,
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}°C {:.1}%RH pH {:.2} N {} P {} K {}",
            self.temperature_c,
            self.humidity_pct,
            self.ph,
            self.nitrogen_ppm,
            self.phosphorus_ppm,
            self.potassium_ppm
        )
    }
}

// --- Transactions ---

/// Monotonic id of a transaction attempt, unique per controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a transaction attempt resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum TransactionOutcome {
    Success,
    Timeout,
    CrcMismatch,
    MalformedFrame,
    TransportError,
    /// Link was torn down while the transaction was in flight.
    Aborted,
    /// Device replied with a Modbus exception code.
    DeviceException(u8),
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Success)
    }
}

/// Diagnostic record of one request/response cycle. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Wall-clock time the request was sent.
    pub timestamp: DateTime<Local>,
    pub request_bytes: Vec<u8>,
    /// Bytes received before resolution; `None` if nothing arrived.
    pub response_bytes: Option<Vec<u8>>,
    pub elapsed_ms: u64,
    pub outcome: TransactionOutcome,
}

// --- Connection ---

/// Link status reported to the host.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    AwaitingPermission,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::AwaitingPermission => "awaiting permission",
            ConnectionStatus::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Why a link was torn down.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DisconnectReason {
    /// Host asked for it.
    Requested,
    /// Host left the foreground.
    Suspended,
    /// Engine is shutting down.
    Shutdown,
    /// The transport reported an I/O failure.
    TransportError(String),
}

impl DisconnectReason {
    /// Outcome recorded for a transaction aborted by this disconnect.
    pub fn abort_outcome(&self) -> TransactionOutcome {
        match self {
            DisconnectReason::TransportError(_) => TransactionOutcome::TransportError,
            _ => TransactionOutcome::Aborted,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Requested => f.write_str("requested"),
            DisconnectReason::Suspended => f.write_str("suspended"),
            DisconnectReason::Shutdown => f.write_str("shutdown"),
            DisconnectReason::TransportError(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_scaling() {
        let reading = SensorReading::from_registers([250, 500, 652, 50, 25, 40], Local::now());
        assert_eq!(reading.temperature_c, 25.0);
        assert_eq!(reading.humidity_pct, 50.0);
        assert_eq!(reading.ph, 6.52);
        assert_eq!(reading.nitrogen_ppm, 50);
        assert_eq!(reading.phosphorus_ppm, 25);
        assert_eq!(reading.potassium_ppm, 40);
    }

    #[test]
    fn test_negative_temperature() {
        // -5.5 °C as two's complement
        let reading = SensorReading::from_registers([0xFFC9, 0, 700, 0, 0, 0], Local::now());
        assert_eq!(reading.temperature_c, -5.5);
        assert_eq!(reading.ph, 7.0);
    }

    #[test]
    fn test_reading_display() {
        let reading = SensorReading::from_registers([250, 500, 652, 50, 25, 40], Local::now());
        assert_eq!(reading.to_string(), "25.0°C 50.0%RH pH 6.52 N 50 P 25 K 40");
    }

    #[test]
    fn test_abort_outcome() {
        assert_eq!(DisconnectReason::Suspended.abort_outcome(), TransactionOutcome::Aborted);
        assert_eq!(DisconnectReason::Shutdown.abort_outcome(), TransactionOutcome::Aborted);
        assert_eq!(
            DisconnectReason::TransportError("EIO".into()).abort_outcome(),
            TransactionOutcome::TransportError
        );
    }

    #[test]
    fn test_outcome_wire_shape() {
        assert_eq!(
            serde_json::to_value(TransactionOutcome::Success).unwrap(),
            serde_json::json!({ "kind": "success" })
        );
        assert_eq!(
            serde_json::to_value(TransactionOutcome::DeviceException(0x02)).unwrap(),
            serde_json::json!({ "kind": "device_exception", "code": 2 })
        );
        let parsed: TransactionOutcome =
            serde_json::from_str(r#"{"kind":"crc_mismatch"}"#).unwrap();
        assert_eq!(parsed, TransactionOutcome::CrcMismatch);
    }

    #[test]
    fn test_record_and_reading_serde_round_trip() {
        let reading = SensorReading::from_registers([0xFFC9, 500, 652, 50, 25, 40], Local::now());
        let json = serde_json::to_string(&reading).unwrap();
        let back: SensorReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);

        let record = TransactionRecord {
            id: TransactionId(7),
            timestamp: Local::now(),
            request_bytes: vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x06, 0xC5, 0xC8],
            response_bytes: None,
            elapsed_ms: 1000,
            outcome: TransactionOutcome::Timeout,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["response_bytes"], serde_json::Value::Null);
        assert_eq!(value["outcome"], serde_json::json!({ "kind": "timeout" }));
        let back: TransactionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
