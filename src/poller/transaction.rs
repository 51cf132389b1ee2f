// src/poller/transaction.rs

use chrono::{DateTime, Local};
use core::time::Duration;
use std::time::Instant;
use tracing::{debug, trace};

use crate::common::{
    error::ProbeError,
    hal_traits::SerialLink,
    request::{ReadHoldingRegisters, RequestFrame},
    response::{decode_response, AssemblerStatus, FrameAssembler},
    types::{SensorReading, TransactionId, TransactionOutcome, TransactionRecord},
};

/// Returned by a successful [`TransactionController::begin_transaction`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransactionHandle {
    pub id: TransactionId,
    /// When the armed timeout fires.
    pub deadline: Instant,
}

/// What a resolved transaction hands to the host.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: TransactionRecord,
    /// Present only when `record.outcome` is `Success`.
    pub reading: Option<SensorReading>,
}

/// State of the one request in flight. Dropping it is what frees the link
/// for the next request.
#[derive(Debug)]
struct PendingTransaction {
    id: TransactionId,
    started_at: Instant,
    timestamp: DateTime<Local>,
    deadline: Instant,
    request: RequestFrame,
    assembler: FrameAssembler,
}

/// Owns the single-in-flight invariant for the link.
///
/// Every entry point takes `&mut self`, so whoever owns the controller is the
/// mutual-exclusion boundary: check for a pending transaction, act on it and
/// destroy it all happen inside one call. Resolution always goes through
/// `resolve`, which consumes the pending state; a second resolution of the
/// same transaction cannot be expressed.
#[derive(Debug)]
pub struct TransactionController {
    request: ReadHoldingRegisters,
    response_timeout: Duration,
    next_id: u64,
    pending: Option<PendingTransaction>,
}

impl TransactionController {
    pub fn new(request: ReadHoldingRegisters, response_timeout: Duration) -> Self {
        TransactionController {
            request,
            response_timeout,
            next_id: 1,
            pending: None,
        }
    }

    pub fn request(&self) -> &ReadHoldingRegisters {
        &self.request
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Id of the transaction in flight, if any.
    pub fn in_flight(&self) -> Option<TransactionId> {
        self.pending.as_ref().map(|p| p.id)
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// The armed timeout of the transaction in flight.
    pub fn pending_deadline(&self) -> Option<(TransactionId, Instant)> {
        self.pending.as_ref().map(|p| (p.id, p.deadline))
    }

    /// Sends the request and arms the response timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(TransactionHandle)` once the request has been handed to the link.
    /// * `Err(ProbeError::Busy)` if a transaction is already in flight; the
    ///   existing one is left untouched.
    /// * `Err(ProbeError::Io)` if the write failed. The transaction stays in
    ///   flight so the disconnect that must follow records it as a transport
    ///   error.
    pub fn begin_transaction<L>(
        &mut self,
        link: &mut L,
        now: Instant,
    ) -> Result<TransactionHandle, ProbeError<L::Error>>
    where
        L: SerialLink,
    {
        if let Some(pending) = &self.pending {
            trace!(id = %pending.id, "begin refused, transaction in flight");
            return Err(ProbeError::Busy);
        }

        let id = TransactionId(self.next_id);
        self.next_id += 1;
        let request = self.request.encode();
        let deadline = now + self.response_timeout;

        self.pending = Some(PendingTransaction {
            id,
            started_at: now,
            timestamp: Local::now(),
            deadline,
            request: request.clone(),
            assembler: FrameAssembler::new(),
        });

        debug!(%id, request = ?format_args!("{:02X?}", request.as_slice()), "sending request");
        link.write(&request).map_err(ProbeError::Io)?;

        Ok(TransactionHandle { id, deadline })
    }

    /// Feeds received bytes to the transaction in flight.
    ///
    /// Bytes arriving while nothing is in flight are discarded. Returns the
    /// resolution once the bytes complete (or break) a frame.
    pub fn on_bytes_received(&mut self, bytes: &[u8], now: Instant) -> Option<Resolution> {
        let Some(pending) = self.pending.as_mut() else {
            trace!(len = bytes.len(), "discarding bytes received outside a transaction");
            return None;
        };

        match pending.assembler.push(bytes) {
            AssemblerStatus::Incomplete => None,
            AssemblerStatus::Malformed(reason) => {
                debug!(id = %pending.id, %reason, "malformed response");
                self.resolve(TransactionOutcome::MalformedFrame, None, now)
            }
            AssemblerStatus::Complete(frame) => {
                match decode_response(&frame, &self.request, Local::now()) {
                    Ok(reading) => self.resolve(TransactionOutcome::Success, Some(reading), now),
                    Err(ProbeError::CrcMismatch { expected, calculated }) => {
                        debug!(
                            id = %pending.id,
                            expected = format_args!("{:#06x}", expected),
                            calculated = format_args!("{:#06x}", calculated),
                            "CRC mismatch"
                        );
                        self.resolve(TransactionOutcome::CrcMismatch, None, now)
                    }
                    Err(ProbeError::DeviceException(code)) => {
                        debug!(id = %pending.id, code, "device exception");
                        self.resolve(TransactionOutcome::DeviceException(code), None, now)
                    }
                    Err(e) => {
                        debug!(id = %pending.id, error = %e, "unusable response");
                        self.resolve(TransactionOutcome::MalformedFrame, None, now)
                    }
                }
            }
        }
    }

    /// Fired by the timer armed for transaction `id`.
    ///
    /// A no-op if that transaction has already resolved, or if called before
    /// its deadline.
    pub fn on_timeout(&mut self, id: TransactionId, now: Instant) -> Option<Resolution> {
        let pending = self.pending.as_ref()?;
        if pending.id != id {
            trace!(%id, "stale timer ignored");
            return None;
        }
        if now < pending.deadline {
            return None;
        }
        debug!(%id, received = pending.assembler.buffered().len(), "response timed out");
        self.resolve(TransactionOutcome::Timeout, None, now)
    }

    /// Resolves the transaction in flight (if any) because the link is going away.
    pub fn abort(&mut self, outcome: TransactionOutcome, now: Instant) -> Option<Resolution> {
        debug_assert!(!outcome.is_success(), "abort cannot produce a reading");
        self.pending.as_ref()?;
        self.resolve(outcome, None, now)
    }

    /// Single exit point for every pending transaction.
    fn resolve(
        &mut self,
        outcome: TransactionOutcome,
        reading: Option<SensorReading>,
        now: Instant,
    ) -> Option<Resolution> {
        let pending = self.pending.take();
        debug_assert!(pending.is_some(), "resolve called with nothing in flight");
        let pending = pending?;
        debug_assert_eq!(outcome.is_success(), reading.is_some());

        let buffered = pending.assembler.buffered();
        let record = TransactionRecord {
            id: pending.id,
            timestamp: pending.timestamp,
            request_bytes: pending.request.to_vec(),
            response_bytes: (!buffered.is_empty()).then(|| buffered.to_vec()),
            elapsed_ms: now.saturating_duration_since(pending.started_at).as_millis() as u64,
            outcome,
        };

        Some(Resolution { record, reading })
    }
}

impl Default for TransactionController {
    fn default() -> Self {
        Self::new(ReadHoldingRegisters::SENSOR_BLOCK, crate::common::timing::RESPONSE_TIMEOUT)
    }
}
