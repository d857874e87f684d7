//! The single-threaded tick loop.
//!
//! One thread performs {update, marshal, publish, heartbeat observe, sleep}
//! indefinitely. A fault inside one tick abandons that tick and slows the
//! loop down; only heartbeat loss (or external kill) ends it.

use crate::heartbeat::{HeartbeatSupervisor, LinkState};
use crate::memory::RecordPublisher;
use crate::plugin::ModuleAdapter;
use crate::record::TrackingRecord;
use log::{info, warn};
use std::time::{Duration, Instant};

/// Normal inter-tick delay.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Delay after a recoverable tick fault, so a persistently faulting module
/// cannot storm the log or the CPU.
pub const FAULT_BACKOFF: Duration = Duration::from_secs(1);

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame marshaled and published; local counter advanced.
    Published,
    /// Module fault; tick abandoned, nothing published, counter unchanged.
    Faulted,
    /// Remote heartbeat stalled past the timeout; loop must exit.
    HeartbeatLost,
}

/// Owns the per-tick cycle: module adapter, publisher, and supervisor.
pub struct BridgeRunner {
    adapter: ModuleAdapter,
    publisher: RecordPublisher,
    supervisor: HeartbeatSupervisor,
    local_tick: u64,
}

impl BridgeRunner {
    pub fn new(
        adapter: ModuleAdapter,
        publisher: RecordPublisher,
        supervisor: HeartbeatSupervisor,
    ) -> Self {
        Self {
            adapter,
            publisher,
            supervisor,
            local_tick: 0,
        }
    }

    /// Ticks published so far. Strictly +1 per successful iteration, never
    /// reset while the process lives.
    pub fn local_tick(&self) -> u64 {
        self.local_tick
    }

    pub fn supervisor(&self) -> &HeartbeatSupervisor {
        &self.supervisor
    }

    /// Execute one loop iteration at time `now`.
    ///
    /// On a module fault the marshal and publish steps are skipped entirely:
    /// the region keeps the previous successful frame rather than a partial
    /// overwrite. The remote heartbeat is still observed so a dead consumer
    /// is detected even while the module is faulting.
    pub fn run_once(&mut self, now: Instant) -> TickOutcome {
        let published = match self.adapter.update() {
            Ok(()) => {
                let mut record =
                    TrackingRecord::pack(self.adapter.data(), self.local_tick + 1, 0);
                self.publisher.publish(&mut record);
                self.local_tick += 1;
                true
            }
            Err(e) => {
                warn!("'{}' update fault, tick abandoned: {}", self.adapter.name(), e);
                false
            }
        };

        if self.supervisor.observe(self.publisher.remote_tick(), now) == LinkState::Degraded {
            warn!(
                "consumer heartbeat stalled, shutting down after {} ticks",
                self.local_tick
            );
            self.supervisor.terminate();
            return TickOutcome::HeartbeatLost;
        }

        if published {
            TickOutcome::Published
        } else {
            TickOutcome::Faulted
        }
    }

    /// Run until heartbeat loss, then tear the module down.
    pub fn run(&mut self) {
        loop {
            match self.run_once(Instant::now()) {
                TickOutcome::Published => std::thread::sleep(TICK_INTERVAL),
                TickOutcome::Faulted => std::thread::sleep(FAULT_BACKOFF),
                TickOutcome::HeartbeatLost => break,
            }
        }
        info!("'{}' shutting down", self.adapter.name());
        self.adapter.teardown();
    }
}
