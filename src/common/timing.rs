// src/common/timing.rs

use core::time::Duration;

/// Cadence of the polling scheduler while the host is in the foreground.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long a transaction may stay in flight before it resolves as a timeout.
/// Deliberately shorter than [`POLL_INTERVAL`] so a timed-out transaction is
/// always cleared before the next tick.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Poll interval of the reader thread in the desktop transport. Bounds how
/// quickly a close request is noticed, not how fast bytes are delivered.
#[cfg(feature = "serialport")]
pub const READER_POLL: Duration = Duration::from_millis(50);
