//! Shared memory transport between the bridge and the consumer daemon.
//!
//! One fixed-size named region holds one [`crate::record::TrackingRecord`].
//! No locks: every field has exactly one writer (see `RecordPublisher`).

mod publisher;
mod shm_region;

pub use publisher::{RecordPublisher, REGION_NAME};
pub use shm_region::{shm_dir, ShmRegion};
