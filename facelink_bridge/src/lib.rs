//! # facelink bridge
//!
//! Hosts exactly one tracking module per run: loads its library inside an
//! isolated resolution scope, locates and initializes the entry module,
//! then republishes each frame into a named shared-memory region consumed by
//! the facelink daemon. A bidirectional pair of tick counters in the region
//! lets either side detect that the other has disappeared.
//!
//! Load-time flow: [`plugin::ResolutionContext`] → [`plugin::locator`] →
//! [`plugin::ModuleAdapter`]. Per-tick flow: [`runner::BridgeRunner`] drives
//! update → [`record::TrackingRecord::pack`] → [`memory::RecordPublisher`] →
//! [`heartbeat::HeartbeatSupervisor`].

pub mod error;
pub mod heartbeat;
pub mod memory;
pub mod plugin;
pub mod record;
pub mod runner;

pub use error::{BridgeError, BridgeResult};
pub use heartbeat::{HeartbeatSupervisor, LinkState, HEARTBEAT_TIMEOUT};
pub use memory::{RecordPublisher, ShmRegion, REGION_NAME};
pub use plugin::ModuleAdapter;
pub use record::{TrackingRecord, EXPRESSION_CAPACITY, RECORD_SIZE};
pub use runner::{BridgeRunner, TickOutcome, FAULT_BACKOFF, TICK_INTERVAL};
