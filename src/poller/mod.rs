// src/poller/mod.rs

// --- Declare the poller's modules ---
pub mod connection;
pub mod engine;
pub mod scheduler;
pub mod transaction;

#[cfg(test)]
mod mock;

// --- Re-export key types ---

// From connection.rs
pub use connection::{ConnectionManager, LinkId, LinkObserver, ScanOutcome};

// From engine.rs
pub use engine::{EngineEvents, EngineHandle, ProbeEngine};

// From scheduler.rs
pub use scheduler::{PollingScheduler, SchedulerState, SchedulerTransition, TickAction};

// From transaction.rs
pub use transaction::{Resolution, TransactionController, TransactionHandle};
