//! Consumer liveness supervision.
//!
//! The bridge and the consumer daemon prove liveness to each other through
//! two counters in the shared record: the bridge advances `local_tick`, the
//! consumer advances `remote_tick`. There is no control channel — when the
//! remote counter stalls after having been seen active, the bridge shuts
//! itself down.

use std::time::{Duration, Instant};

/// How long the remote counter may hold still before the link is declared
/// dead. Only armed once the counter has been observed nonzero, so a consumer
/// that has not attached yet never trips it.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bridge lifecycle state.
///
/// `Starting → Bound → Running → Degraded → Terminated`, plus a direct jump
/// to `Terminated` from anywhere on a fatal fault. Once past `Running` the
/// machine never reports `Running` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Before locate + initialize succeed.
    Starting,
    /// Module located and initialized; region not open yet.
    Bound,
    /// Publishing ticks; remote liveness monitored.
    Running,
    /// Remote counter stalled past the timeout.
    Degraded,
    /// Loop exited (heartbeat loss or fatal fault).
    Terminated,
}

/// Tracks the remote heartbeat counter and drives the lifecycle states.
///
/// Time is passed in explicitly so the stall window can be tested without
/// sleeping.
#[derive(Debug)]
pub struct HeartbeatSupervisor {
    state: LinkState,
    timeout: Duration,
    last_remote: u64,
    remote_seen: bool,
    last_change: Instant,
}

impl HeartbeatSupervisor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: LinkState::Starting,
            timeout,
            last_remote: 0,
            remote_seen: false,
            last_change: Instant::now(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Module located and initialized.
    pub fn bound(&mut self) {
        if self.state == LinkState::Starting {
            self.state = LinkState::Bound;
        }
    }

    /// Shared-memory region opened; liveness monitoring starts at `now`.
    pub fn running(&mut self, now: Instant) {
        if self.state == LinkState::Bound {
            self.state = LinkState::Running;
            self.last_change = now;
        }
    }

    /// Feed one observation of the remote counter.
    ///
    /// A changed value confirms liveness and resets the stall timer. An
    /// unchanged value trips `Degraded` only if the counter was ever seen
    /// nonzero and the timeout has elapsed since the last change.
    pub fn observe(&mut self, remote: u64, now: Instant) -> LinkState {
        if self.state == LinkState::Running {
            if remote != self.last_remote {
                self.last_remote = remote;
                if remote != 0 {
                    self.remote_seen = true;
                }
                self.last_change = now;
            } else if self.remote_seen
                && now.duration_since(self.last_change) > self.timeout
            {
                self.state = LinkState::Degraded;
            }
        }
        self.state
    }

    /// Unconditional, immediate. Entered from `Degraded` on heartbeat loss
    /// and from any state on a fatal fault.
    pub fn terminate(&mut self) {
        self.state = LinkState::Terminated;
    }
}

impl Default for HeartbeatSupervisor {
    fn default() -> Self {
        Self::new(HEARTBEAT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_supervisor(timeout: Duration, now: Instant) -> HeartbeatSupervisor {
        let mut sup = HeartbeatSupervisor::new(timeout);
        sup.bound();
        sup.running(now);
        sup
    }

    #[test]
    fn lifecycle_reaches_running_in_order() {
        let mut sup = HeartbeatSupervisor::new(HEARTBEAT_TIMEOUT);
        assert_eq!(sup.state(), LinkState::Starting);

        // Region cannot open before the module is bound.
        sup.running(Instant::now());
        assert_eq!(sup.state(), LinkState::Starting);

        sup.bound();
        assert_eq!(sup.state(), LinkState::Bound);
        sup.running(Instant::now());
        assert_eq!(sup.state(), LinkState::Running);
    }

    #[test]
    fn startup_grace_never_times_out() {
        let t0 = Instant::now();
        let mut sup = running_supervisor(Duration::from_secs(10), t0);

        // Remote counter never becomes nonzero; hours may pass.
        let much_later = t0 + Duration::from_secs(3600);
        assert_eq!(sup.observe(0, much_later), LinkState::Running);
        assert_eq!(sup.observe(0, much_later + Duration::from_secs(3600)), LinkState::Running);
    }

    #[test]
    fn stall_after_activity_degrades_exactly_once() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(10);
        let mut sup = running_supervisor(timeout, t0);

        assert_eq!(sup.observe(1, t0 + Duration::from_secs(1)), LinkState::Running);
        assert_eq!(sup.observe(2, t0 + Duration::from_secs(2)), LinkState::Running);

        // Counter holds at 2 past the timeout window.
        assert_eq!(sup.observe(2, t0 + Duration::from_secs(11)), LinkState::Running);
        assert_eq!(sup.observe(2, t0 + Duration::from_secs(13)), LinkState::Degraded);

        // Once degraded, a late counter change never resurrects the link.
        assert_eq!(sup.observe(3, t0 + Duration::from_secs(14)), LinkState::Degraded);
        sup.terminate();
        assert_eq!(sup.observe(4, t0 + Duration::from_secs(15)), LinkState::Terminated);
    }

    #[test]
    fn changing_counter_resets_the_stall_timer() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(10);
        let mut sup = running_supervisor(timeout, t0);

        let mut now = t0;
        for tick in 1..=5u64 {
            now += Duration::from_secs(9);
            assert_eq!(sup.observe(tick, now), LinkState::Running);
        }
        // 9 seconds of stall is still within the window.
        assert_eq!(sup.observe(5, now + Duration::from_secs(9)), LinkState::Running);
    }

    #[test]
    fn preexisting_nonzero_counter_arms_the_timeout() {
        // Consumer wrote before the bridge started, then died.
        let t0 = Instant::now();
        let mut sup = running_supervisor(Duration::from_secs(10), t0);

        assert_eq!(sup.observe(99, t0), LinkState::Running);
        assert_eq!(sup.observe(99, t0 + Duration::from_secs(11)), LinkState::Degraded);
    }

    #[test]
    fn fatal_fault_terminates_from_any_state() {
        let mut sup = HeartbeatSupervisor::new(HEARTBEAT_TIMEOUT);
        sup.terminate();
        assert_eq!(sup.state(), LinkState::Terminated);
        // Terminated is absorbing.
        sup.bound();
        sup.running(Instant::now());
        assert_eq!(sup.state(), LinkState::Terminated);
    }
}
