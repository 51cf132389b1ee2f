// src/poller/scheduler.rs

use core::time::Duration;
use tracing::debug;

use crate::common::types::ConnectionStatus;

/// Whether the host application is in the foreground.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SchedulerState {
    Active,
    Suspended,
}

/// What the owner of the scheduler must do for one tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TickAction {
    /// Connected and idle: send the next request.
    BeginTransaction,
    /// Connected but a request is still outstanding: skip this slot.
    SkipInFlight,
    /// No link: run device discovery.
    Discover,
    /// A permission prompt is outstanding: leave it alone.
    WaitForPermission,
    /// Suspended: nothing to do.
    Idle,
}

/// Side effects the owner must perform after a foreground change.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SchedulerTransition {
    /// Restart the timer and attempt discovery immediately.
    Resumed,
    /// Stop the timer and disconnect with reason `Suspended`.
    Suspended,
}

/// Two-state foreground machine deciding what each tick does.
///
/// Owns no timer and no link; the engine drives it and carries out the
/// returned actions.
#[derive(Debug, Clone)]
pub struct PollingScheduler {
    state: SchedulerState,
    interval: Duration,
}

impl PollingScheduler {
    /// A scheduler with the given tick period, starting `Suspended`.
    pub fn new(interval: Duration) -> Self {
        debug_assert!(!interval.is_zero(), "poll interval must be positive");
        PollingScheduler {
            state: SchedulerState::Suspended,
            interval,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SchedulerState::Active
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Applies a foreground flag from the host.
    ///
    /// Returns `None` when the flag does not change the state.
    pub fn set_foreground(&mut self, foreground: bool) -> Option<SchedulerTransition> {
        let next = if foreground {
            SchedulerState::Active
        } else {
            SchedulerState::Suspended
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        debug!(state = ?next, "scheduler state changed");
        Some(match next {
            SchedulerState::Active => SchedulerTransition::Resumed,
            SchedulerState::Suspended => SchedulerTransition::Suspended,
        })
    }

    /// Decides what a tick does given the current link state.
    pub fn on_tick(&self, status: ConnectionStatus, in_flight: bool) -> TickAction {
        if !self.is_active() {
            return TickAction::Idle;
        }
        match status {
            ConnectionStatus::Connected if in_flight => TickAction::SkipInFlight,
            ConnectionStatus::Connected => TickAction::BeginTransaction,
            ConnectionStatus::AwaitingPermission => TickAction::WaitForPermission,
            ConnectionStatus::Disconnected => TickAction::Discover,
        }
    }
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new(crate::common::timing::POLL_INTERVAL)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_suspended() {
        let s = PollingScheduler::default();
        assert_eq!(s.state(), SchedulerState::Suspended);
        assert_eq!(s.interval(), Duration::from_secs(5));
        assert_eq!(s.on_tick(ConnectionStatus::Connected, false), TickAction::Idle);
    }

    #[test]
    fn test_foreground_transitions() {
        let mut s = PollingScheduler::default();
        assert_eq!(s.set_foreground(true), Some(SchedulerTransition::Resumed));
        assert_eq!(s.set_foreground(true), None);
        assert!(s.is_active());
        assert_eq!(s.set_foreground(false), Some(SchedulerTransition::Suspended));
        assert_eq!(s.set_foreground(false), None);
        assert!(!s.is_active());
    }

    #[test]
    fn test_tick_decisions_while_active() {
        let mut s = PollingScheduler::new(Duration::from_secs(1));
        s.set_foreground(true);
        assert_eq!(s.on_tick(ConnectionStatus::Connected, false), TickAction::BeginTransaction);
        assert_eq!(s.on_tick(ConnectionStatus::Connected, true), TickAction::SkipInFlight);
        assert_eq!(s.on_tick(ConnectionStatus::Disconnected, false), TickAction::Discover);
        assert_eq!(
            s.on_tick(ConnectionStatus::AwaitingPermission, false),
            TickAction::WaitForPermission
        );
    }
}
