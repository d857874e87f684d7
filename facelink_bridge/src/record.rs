//! The fixed-layout tracking record published to shared memory.
//!
//! Field order is the wire contract with the consumer daemon: offsets must
//! not shift within a release. The record is a `bytemuck::Pod` so it can be
//! copied in and out of the mapped region as raw bytes.

use bytemuck::{Pod, Zeroable};
use facelink_api::UnifiedTrackingData;

/// Fixed capacity of the expression weight array. Deliberately larger than
/// the current shape count so appending shapes does not move the counters.
pub const EXPRESSION_CAPACITY: usize = 200;

/// Per-frame tracking snapshot, packed for shared-memory transport.
///
/// Size: 896 bytes (220 floats + two u64 counters, no padding).
///
/// Ownership is partitioned per field: the bridge writes everything except
/// `remote_tick`, which only the consumer writes. The bridge echoes back the
/// last `remote_tick` it read; see `RecordPublisher::publish`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TrackingRecord {
    pub left_eye_gaze_x: f32,
    pub left_eye_gaze_y: f32,
    pub left_eye_gaze_z: f32,
    pub left_eye_pupil_diameter_mm: f32,
    pub left_eye_openness: f32,

    pub right_eye_gaze_x: f32,
    pub right_eye_gaze_y: f32,
    pub right_eye_gaze_z: f32,
    pub right_eye_pupil_diameter_mm: f32,
    pub right_eye_openness: f32,

    pub eye_max_dilation: f32,
    pub eye_min_dilation: f32,
    /// Per-eye diameter duplicates, kept for consumers that predate the
    /// per-eye `pupil_diameter_mm` fields.
    pub eye_left_diameter: f32,
    pub eye_right_diameter: f32,

    pub head_yaw: f32,
    pub head_pitch: f32,
    pub head_roll: f32,
    pub head_pos_x: f32,
    pub head_pos_y: f32,
    pub head_pos_z: f32,

    pub shapes: [f32; EXPRESSION_CAPACITY],

    /// Bridge liveness counter: +1 per successful tick, never resets.
    pub local_tick: u64,
    /// Consumer liveness counter. Bridge-read-only.
    pub remote_tick: u64,
}

/// Total size of the shared record in bytes.
pub const RECORD_SIZE: usize = std::mem::size_of::<TrackingRecord>();

/// Byte offset of the consumer-owned heartbeat field inside the region.
pub const REMOTE_TICK_OFFSET: usize = std::mem::offset_of!(TrackingRecord, remote_tick);

impl TrackingRecord {
    /// Marshal one frame. Pure transformation, no I/O.
    ///
    /// Weight slots beyond `data.shapes.len()` stay zero — the record starts
    /// zeroed, so a module reporting fewer shapes than the capacity can never
    /// leak stale weights from a previous load.
    pub fn pack(data: &UnifiedTrackingData, local_tick: u64, remote_tick: u64) -> Self {
        let mut record = Self::zeroed();

        record.left_eye_gaze_x = data.eye.left.gaze.x;
        record.left_eye_gaze_y = data.eye.left.gaze.y;
        record.left_eye_gaze_z = data.eye.left.gaze.z;
        record.left_eye_pupil_diameter_mm = data.eye.left.pupil_diameter_mm;
        record.left_eye_openness = data.eye.left.openness;

        record.right_eye_gaze_x = data.eye.right.gaze.x;
        record.right_eye_gaze_y = data.eye.right.gaze.y;
        record.right_eye_gaze_z = data.eye.right.gaze.z;
        record.right_eye_pupil_diameter_mm = data.eye.right.pupil_diameter_mm;
        record.right_eye_openness = data.eye.right.openness;

        record.eye_max_dilation = data.eye.max_dilation;
        record.eye_min_dilation = data.eye.min_dilation;
        record.eye_left_diameter = data.eye.left_diameter;
        record.eye_right_diameter = data.eye.right_diameter;

        record.head_yaw = data.head.head_yaw;
        record.head_pitch = data.head.head_pitch;
        record.head_roll = data.head.head_roll;
        record.head_pos_x = data.head.head_pos_x;
        record.head_pos_y = data.head.head_pos_y;
        record.head_pos_z = data.head.head_pos_z;

        for (slot, shape) in record.shapes.iter_mut().zip(data.shapes.iter()) {
            *slot = shape.weight;
        }

        record.local_tick = local_tick;
        record.remote_tick = remote_tick;
        record
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reconstruct a record from region bytes. Panics if `bytes` is not
    /// exactly `RECORD_SIZE` long.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelink_api::{UnifiedExpressions, UnifiedTrackingData};
    use std::mem::offset_of;

    #[test]
    fn record_layout_is_stable() {
        // 220 floats + 2 u64, no padding anywhere.
        assert_eq!(RECORD_SIZE, 220 * 4 + 16);
        assert_eq!(offset_of!(TrackingRecord, left_eye_gaze_x), 0);
        assert_eq!(offset_of!(TrackingRecord, right_eye_gaze_x), 20);
        assert_eq!(offset_of!(TrackingRecord, eye_max_dilation), 40);
        assert_eq!(offset_of!(TrackingRecord, head_yaw), 56);
        assert_eq!(offset_of!(TrackingRecord, shapes), 80);
        assert_eq!(offset_of!(TrackingRecord, local_tick), 880);
        assert_eq!(REMOTE_TICK_OFFSET, 888);
    }

    #[test]
    fn pack_copies_every_tracked_field() {
        let mut data = UnifiedTrackingData::default();
        data.eye.left.gaze.x = 0.5;
        data.eye.left.openness = 0.9;
        data.eye.right.pupil_diameter_mm = 3.5;
        data.eye.min_dilation = 1.0;
        data.eye.max_dilation = 6.0;
        data.head.head_yaw = -0.25;
        data.head.head_pos_z = 1.5;
        data.shapes[UnifiedExpressions::JawOpen as usize].weight = 0.8;

        let record = TrackingRecord::pack(&data, 7, 3);

        assert_eq!(record.left_eye_gaze_x, 0.5);
        assert_eq!(record.left_eye_openness, 0.9);
        assert_eq!(record.right_eye_pupil_diameter_mm, 3.5);
        assert_eq!(record.eye_min_dilation, 1.0);
        assert_eq!(record.eye_max_dilation, 6.0);
        assert_eq!(record.head_yaw, -0.25);
        assert_eq!(record.head_pos_z, 1.5);
        assert_eq!(record.shapes[UnifiedExpressions::JawOpen as usize], 0.8);
        assert_eq!(record.local_tick, 7);
        assert_eq!(record.remote_tick, 3);
    }

    #[test]
    fn slots_past_reported_count_are_zero() {
        let mut data = UnifiedTrackingData::default();
        for shape in data.shapes.iter_mut() {
            shape.weight = 1.0;
        }
        // Module reports fewer shapes than the record capacity.
        data.shapes.truncate(10);

        let record = TrackingRecord::pack(&data, 1, 0);
        assert!(record.shapes[..10].iter().all(|w| *w == 1.0));
        assert!(record.shapes[10..].iter().all(|w| *w == 0.0));
    }

    #[test]
    fn two_dimensional_gaze_leaves_z_zero() {
        let mut data = UnifiedTrackingData::default();
        data.eye.left.gaze.x = 0.1;
        data.eye.left.gaze.y = -0.2;

        let record = TrackingRecord::pack(&data, 1, 0);
        assert_eq!(record.left_eye_gaze_z, 0.0);
        assert_eq!(record.right_eye_gaze_z, 0.0);
    }

    #[test]
    fn byte_round_trip() {
        let mut data = UnifiedTrackingData::default();
        data.eye.right.gaze.y = 0.33;
        let record = TrackingRecord::pack(&data, 42, 9);

        let restored = TrackingRecord::from_bytes(record.as_bytes());
        assert_eq!(restored.right_eye_gaze_y, 0.33);
        assert_eq!(restored.local_tick, 42);
        assert_eq!(restored.remote_tick, 9);
    }
}
