// src/poller/engine.rs

//! The engine task: the one place where link state is mutated.
//!
//! Host commands, events from the transport's receive thread, polling ticks
//! and the armed response deadline all arrive at a single `tokio::select!`
//! loop, so the transaction controller and connection manager never need a
//! lock. Results leave through bounded channels and `watch` snapshots.

use std::future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant as TokioInstant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::connection::{ConnectionManager, LinkId, LinkObserver, ScanOutcome};
use super::scheduler::{PollingScheduler, SchedulerTransition, TickAction};
use super::transaction::{Resolution, TransactionController};
use crate::common::{
    error::{ConfigError, EngineError, ProbeError},
    hal_traits::{DeviceFilter, PortEvent, SerialBackend},
    request::ReadHoldingRegisters,
    types::{ConnectionStatus, DisconnectReason, SensorReading, TransactionId, TransactionRecord},
};
use crate::config::EngineConfig;

#[derive(Debug)]
enum Command {
    SetForeground(bool),
    Disconnect,
    Shutdown,
}

/// Builds and starts an engine over a transport backend.
pub struct ProbeEngine<B: SerialBackend> {
    backend: B,
    config: EngineConfig,
    filter: Box<dyn DeviceFilter>,
}

impl<B> ProbeEngine<B>
where
    B: SerialBackend + 'static,
{
    /// Validates `config` and prepares an engine using its vendor allow-list.
    pub fn new(backend: B, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let filter = Box::new(config.device_filter());
        Ok(ProbeEngine { backend, config, filter })
    }

    /// Replaces the device predicate built from the configuration.
    pub fn with_device_filter<F>(mut self, filter: F) -> Self
    where
        F: DeviceFilter + 'static,
    {
        self.filter = Box::new(filter);
        self
    }

    /// Starts the engine task on the current tokio runtime.
    ///
    /// The engine starts suspended; nothing touches the hardware until the host
    /// calls [`EngineHandle::set_foreground`] with `true`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> (EngineHandle, EngineEvents) {
        let capacity = self.config.channel_capacity;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (reading_tx, reading_rx) = mpsc::channel(capacity);
        let (record_tx, record_rx) = mpsc::channel(capacity);
        let (status_tx, status_rx) = mpsc::channel(capacity);
        let (status_watch_tx, status_watch_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (latest_tx, latest_rx) = watch::channel(None);

        let observer = Arc::new(EngineObserver {
            link_events: link_tx,
            status: status_tx,
            status_watch: status_watch_tx,
        });
        let connection =
            ConnectionManager::new(self.backend, self.filter, self.config.line, observer);

        let actor = EngineActor {
            scheduler: PollingScheduler::new(self.config.poll_interval),
            connection,
            transactions: TransactionController::new(
                ReadHoldingRegisters::SENSOR_BLOCK,
                self.config.response_timeout,
            ),
            readings: reading_tx,
            records: record_tx,
            latest: latest_tx,
            ticker: None,
        };
        let task = tokio::spawn(actor.run(command_rx, link_rx));

        let handle = EngineHandle {
            commands: command_tx,
            status: status_watch_rx,
            latest: latest_rx,
            task,
        };
        let events = EngineEvents {
            readings: reading_rx,
            records: record_rx,
            status: status_rx,
        };
        (handle, events)
    }
}

/// Host-side control of a running engine.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) still
/// stops the engine and closes the port, but does not wait for it.
#[derive(Debug)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    latest: watch::Receiver<Option<SensorReading>>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Tells the engine whether the host is in the foreground.
    ///
    /// `false` disconnects and stops polling; `true` resumes polling and
    /// attempts discovery immediately.
    pub fn set_foreground(&self, foreground: bool) -> Result<(), EngineError> {
        self.send(Command::SetForeground(foreground))
    }

    /// Closes the link now. While in the foreground, the next tick reconnects.
    pub fn disconnect(&self) -> Result<(), EngineError> {
        self.send(Command::Disconnect)
    }

    /// Current link status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Most recent successful reading, if any.
    pub fn latest_reading(&self) -> Option<SensorReading> {
        self.latest.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Disconnects, stops the scheduler and waits for the engine task to end.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        // Already stopped is fine; the join below reports how it ended.
        let _ = self.commands.send(Command::Shutdown);
        self.task.await?;
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands.send(command).map_err(|_| EngineError::Stopped)
    }
}

/// Outbound event streams. Each channel is bounded; when a consumer falls
/// behind, new items are dropped rather than stalling the link.
#[derive(Debug)]
pub struct EngineEvents {
    /// One item per successful transaction.
    pub readings: mpsc::Receiver<SensorReading>,
    /// One item per transaction attempt, whatever the outcome.
    pub records: mpsc::Receiver<TransactionRecord>,
    /// Connection status transitions.
    pub status: mpsc::Receiver<ConnectionStatus>,
}

/// Bridges the connection manager's callbacks into the engine.
struct EngineObserver {
    link_events: mpsc::UnboundedSender<(LinkId, PortEvent)>,
    status: mpsc::Sender<ConnectionStatus>,
    status_watch: watch::Sender<ConnectionStatus>,
}

impl LinkObserver for EngineObserver {
    fn port_event(&self, link: LinkId, event: PortEvent) {
        // Fails only once the engine has stopped.
        let _ = self.link_events.send((link, event));
    }

    fn status_changed(&self, status: ConnectionStatus) {
        self.status_watch.send_replace(status);
        if self.status.try_send(status).is_err() {
            debug!(%status, "status event dropped");
        }
    }
}

struct EngineActor<B: SerialBackend> {
    scheduler: PollingScheduler,
    connection: ConnectionManager<B>,
    transactions: TransactionController,
    readings: mpsc::Sender<SensorReading>,
    records: mpsc::Sender<TransactionRecord>,
    latest: watch::Sender<Option<SensorReading>>,
    ticker: Option<Interval>,
}

impl<B: SerialBackend> EngineActor<B> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut link_events: mpsc::UnboundedReceiver<(LinkId, PortEvent)>,
    ) {
        debug!("engine started");
        loop {
            let deadline = self.transactions.pending_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::SetForeground(foreground)) => self.set_foreground(foreground),
                    Some(Command::Disconnect) => self.disconnect(DisconnectReason::Requested),
                    Some(Command::Shutdown) | None => break,
                },
                Some((link, event)) = link_events.recv() => self.on_port_event(link, event),
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                id = deadline_elapsed(deadline) => self.on_timeout(id),
            }
        }

        self.ticker = None;
        self.scheduler.set_foreground(false);
        self.disconnect(DisconnectReason::Shutdown);
        info!("engine stopped");
    }

    fn set_foreground(&mut self, foreground: bool) {
        match self.scheduler.set_foreground(foreground) {
            Some(SchedulerTransition::Resumed) => {
                let period = self.scheduler.interval();
                let mut ticker = time::interval_at(TokioInstant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(ticker);
                info!(interval = ?period, "polling resumed");
                self.discover();
            }
            Some(SchedulerTransition::Suspended) => {
                self.ticker = None;
                info!("polling suspended");
                self.disconnect(DisconnectReason::Suspended);
            }
            None => {}
        }
    }

    fn on_tick(&mut self) {
        let action = self
            .scheduler
            .on_tick(self.connection.status(), self.transactions.is_in_flight());
        trace!(?action, "tick");
        match action {
            TickAction::BeginTransaction => self.begin(),
            TickAction::SkipInFlight => debug!("previous request still in flight, skipping tick"),
            TickAction::Discover => self.discover(),
            TickAction::WaitForPermission | TickAction::Idle => {}
        }
    }

    fn begin(&mut self) {
        let now = now();
        let Some(link) = self.connection.link_mut() else {
            return;
        };
        match self.transactions.begin_transaction(link, now) {
            Ok(handle) => trace!(id = %handle.id, "transaction armed"),
            Err(ProbeError::Busy) => debug!("begin refused, transaction in flight"),
            Err(e) => {
                warn!(error = %e, "request write failed");
                self.disconnect(DisconnectReason::TransportError(e.to_string()));
            }
        }
    }

    fn discover(&mut self) {
        match self.connection.scan_and_connect() {
            Ok(ScanOutcome::Connected(device)) => debug!(device = %device.name, "discovery connected"),
            Ok(ScanOutcome::NoDevice) | Ok(ScanOutcome::AlreadyConnected) => {}
            // Retried on the next tick.
            Err(ProbeError::PermissionDenied) => {}
            Err(e) => warn!(error = %e, "device discovery failed"),
        }
    }

    fn on_port_event(&mut self, link: LinkId, event: PortEvent) {
        if self.connection.current_link() != Some(link) {
            trace!(%link, "dropping event from a closed link");
            return;
        }
        let resolution = match event {
            PortEvent::Data(bytes) => self.transactions.on_bytes_received(&bytes, now()),
            PortEvent::Error(message) => {
                self.connection
                    .on_transport_error(link, message, &mut self.transactions, now())
            }
        };
        self.publish(resolution);
    }

    fn on_timeout(&mut self, id: TransactionId) {
        let resolution = self.transactions.on_timeout(id, now());
        self.publish(resolution);
    }

    fn disconnect(&mut self, reason: DisconnectReason) {
        let resolution = self.connection.disconnect(&reason, &mut self.transactions, now());
        self.publish(resolution);
    }

    fn publish(&mut self, resolution: Option<Resolution>) {
        let Some(Resolution { record, reading }) = resolution else {
            return;
        };
        debug!(id = %record.id, outcome = ?record.outcome, elapsed_ms = record.elapsed_ms, "transaction resolved");

        if let Some(reading) = reading {
            info!(%reading, "sensor reading");
            self.latest.send_replace(Some(reading.clone()));
            if self.readings.try_send(reading).is_err() {
                debug!("reading dropped, consumer not keeping up");
            }
        }
        if self.records.try_send(record).is_err() {
            debug!("transaction record dropped, consumer not keeping up");
        }
    }
}

/// Controller time, taken from tokio's clock so paused test time applies.
fn now() -> std::time::Instant {
    TokioInstant::now().into_std()
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending().await,
    }
}

async fn deadline_elapsed(deadline: Option<(TransactionId, std::time::Instant)>) -> TransactionId {
    match deadline {
        Some((id, at)) => {
            time::sleep_until(TokioInstant::from_std(at)).await;
            id
        }
        None => future::pending().await,
    }
}
