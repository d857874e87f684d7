//! Publishes the tracking record into the shared region each tick.

use crate::error::BridgeResult;
use crate::memory::shm_region::ShmRegion;
use crate::record::{TrackingRecord, RECORD_SIZE, REMOTE_TICK_OFFSET};

/// Region name the consumer daemon opens. Part of the out-of-band contract.
pub const REGION_NAME: &str = "tracking";

/// Owns the mapped region and enforces the field-ownership discipline: every
/// field is bridge-written except `remote_tick`, which is read back from the
/// region before each write so a concurrent consumer update is never
/// clobbered.
#[derive(Debug)]
pub struct RecordPublisher {
    region: ShmRegion,
}

impl RecordPublisher {
    /// Open the well-known tracking region. Called exactly once at startup;
    /// failure is fatal.
    pub fn open() -> BridgeResult<Self> {
        Self::open_named(REGION_NAME)
    }

    /// Open a region under a specific name (tests run against throwaway
    /// names so parallel test processes never share a region).
    pub fn open_named(name: &str) -> BridgeResult<Self> {
        let region = ShmRegion::new(name, RECORD_SIZE)?;
        Ok(Self { region })
    }

    /// Current value of the consumer-owned heartbeat counter.
    pub fn remote_tick(&self) -> u64 {
        // SAFETY: REMOTE_TICK_OFFSET + 8 <= RECORD_SIZE == region length; the
        // consumer writes this field concurrently, so the read is volatile and
        // unaligned-tolerant.
        unsafe {
            (self.region.as_ptr().add(REMOTE_TICK_OFFSET) as *const u64).read_volatile()
        }
    }

    /// Write `record` into the region, first echoing back the last observed
    /// remote heartbeat so the consumer's field is preserved.
    pub fn publish(&mut self, record: &mut TrackingRecord) {
        record.remote_tick = self.remote_tick();
        let bytes = record.as_bytes();
        // SAFETY: bytes.len() == RECORD_SIZE == region length; regions do not
        // overlap the record on the stack.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.region.as_mut_ptr(), bytes.len());
        }
    }

    /// Snapshot the current region contents.
    pub fn read_back(&self) -> TrackingRecord {
        let mut bytes = [0u8; RECORD_SIZE];
        // SAFETY: region length == RECORD_SIZE.
        unsafe {
            std::ptr::copy_nonoverlapping(self.region.as_ptr(), bytes.as_mut_ptr(), RECORD_SIZE);
        }
        TrackingRecord::from_bytes(&bytes)
    }

    pub fn region(&self) -> &ShmRegion {
        &self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelink_api::UnifiedTrackingData;

    fn unique_name(prefix: &str) -> String {
        format!(
            "{}_{}_{}",
            prefix,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        )
    }

    /// Simulate the consumer daemon bumping its heartbeat counter.
    fn poke_remote(publisher: &RecordPublisher, value: u64) {
        // SAFETY: offset within the region; the consumer is the sole writer
        // of this field, which the test is standing in for.
        unsafe {
            (publisher.region().as_ptr().add(REMOTE_TICK_OFFSET) as *mut u64)
                .write_volatile(value);
        }
    }

    #[test]
    fn publish_round_trips_except_remote_field() {
        let name = unique_name("test_pub");
        let mut publisher = RecordPublisher::open_named(&name).expect("open region");

        let mut data = UnifiedTrackingData::default();
        data.eye.left.openness = 0.7;
        data.shapes[3].weight = 0.25;

        let mut record = TrackingRecord::pack(&data, 5, 0);
        publisher.publish(&mut record);

        let back = publisher.read_back();
        assert_eq!(back.left_eye_openness, 0.7);
        assert_eq!(back.shapes[3], 0.25);
        assert_eq!(back.local_tick, 5);
        // Fresh region: remote counter preserved as zero.
        assert_eq!(back.remote_tick, 0);
        assert_eq!(back.as_bytes(), record.as_bytes());
    }

    #[test]
    fn publish_preserves_concurrent_remote_heartbeat() {
        let name = unique_name("test_echo");
        let mut publisher = RecordPublisher::open_named(&name).expect("open region");

        poke_remote(&publisher, 41);

        let data = UnifiedTrackingData::default();
        let mut record = TrackingRecord::pack(&data, 1, 0);
        publisher.publish(&mut record);

        // The outgoing record echoed the consumer's value instead of zeroing it.
        assert_eq!(record.remote_tick, 41);
        assert_eq!(publisher.read_back().remote_tick, 41);
        assert_eq!(publisher.remote_tick(), 41);
    }

    #[test]
    fn fresh_region_reads_back_defaults() {
        let name = unique_name("test_fresh");
        let publisher = RecordPublisher::open_named(&name).expect("open region");
        let back = publisher.read_back();
        assert_eq!(back.local_tick, 0);
        assert_eq!(back.remote_tick, 0);
        assert!(back.shapes.iter().all(|w| *w == 0.0));
    }
}
