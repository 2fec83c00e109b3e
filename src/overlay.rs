//! Metadata queries for the RPC property layer and the overlay text

use serde::Serialize;

use crate::recording::{Segment, SegmentList};

/// One entry of the RPC layer's "videoSegments" property.
///
/// `offset` is the segment's position on the logical timeline (its
/// cumulative `frameno`), not the in-segment rotation offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInfo {
    pub length: u64,
    pub offset: u64,
    pub exposure: f64,
    pub interval: f64,
}

/// Scale for converting trigger-relative ticks into a time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    fn per_second(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Millis => 1_000,
            TimeUnit::Micros => 1_000_000,
            TimeUnit::Nanos => 1_000_000_000,
        }
    }
}

/// Describe every segment for the RPC property getter.
///
/// Copies out plain data; nothing borrowed survives past the caller's
/// lock on the list.
pub fn list_segments(list: &SegmentList) -> Vec<SegmentInfo> {
    list.iter()
        .map(|(_, seg)| {
            let timebase = seg.meta.timebase.max(1) as f64;
            SegmentInfo {
                length: seg.frame_count,
                offset: seg.frameno,
                exposure: seg.meta.exposure as f64 / timebase,
                interval: seg.meta.interval as f64 / timebase,
            }
        })
        .collect()
}

/// Ticks elapsed between the trigger and the frame at `position`.
///
/// `trigger_delay` is the hardware-reported count of frames retained
/// past the trigger. Frames recorded before the trigger come out
/// negative, which is exactly what the overlay prints.
pub fn elapsed_since_trigger(segment: &Segment, position: u64, trigger_delay: u64) -> i64 {
    let local = position.saturating_sub(segment.frameno);
    let remaining = segment.frame_count as i64 - local as i64 - 1;
    (trigger_delay as i64 - remaining) * segment.meta.interval as i64
}

/// Convert trigger-relative ticks into `unit`, against the segment's
/// timebase.
pub fn ticks_in(segment: &Segment, ticks: i64, unit: TimeUnit) -> i64 {
    let timebase = segment.meta.timebase.max(1);
    (i128::from(ticks) * i128::from(unit.per_second()) / i128::from(timebase)) as i64
}
