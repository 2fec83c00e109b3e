//! Shared recording/playback state

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{error, info};

use crate::recording::{BufferBounds, SegmentError, SegmentId, SegmentList, SegmentMeta};
use crate::BufferConfig;

/// A completed trigger event as reported by the capture collaborator.
#[derive(Debug, Clone, Copy)]
pub struct CaptureEvent {
    pub start: u64,
    pub end: u64,
    pub last: u64,
    pub meta: SegmentMeta,
}

/// Snapshot of the transport state for the RPC property layer.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub total_frames: u64,
    pub total_segments: usize,
    pub playback_position: u64,
    pub playback_rate: i32,
}

pub(crate) struct Shared {
    pub segments: SegmentList,
    pub position: u64,
    pub rate: i32,
}

/// The one context object shared between the capture-event consumer, the
/// playback tick and the RPC query surface.
///
/// A single lock covers the segment list and the playback cursor
/// together, so a reader never sees a cursor pointing past a timeline
/// that was just flushed, and `resolve` always observes a fully applied
/// mutation or none of it.
pub struct VideoState {
    inner: Mutex<Shared>,
}

impl VideoState {
    pub fn new(cfg: &BufferConfig) -> Self {
        let bounds = BufferBounds {
            rec_start: cfg.rec_start,
            rec_stop: cfg.rec_stop,
            frame_size: cfg.frame_size,
        };
        Self {
            inner: Mutex::new(Shared {
                segments: SegmentList::new(bounds),
                position: 0,
                rate: 0,
            }),
        }
    }

    // A panic can only happen outside the critical sections below (the
    // mutations themselves are panic-free), so a poisoned lock still
    // guards consistent data.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Book a completed trigger event into the segment list.
    ///
    /// On allocation failure the list is unchanged and the frames remain
    /// in DRAM; the loss is the directory entry only, so it is logged
    /// and not retried.
    pub fn record(&self, event: CaptureEvent) -> Result<SegmentId, SegmentError> {
        let mut inner = self.lock();
        match inner
            .segments
            .add(event.start, event.end, event.last, event.meta)
        {
            Ok(id) => {
                let seg = inner.segments.get(id);
                info!(
                    start = event.start,
                    end = event.end,
                    frames = seg.map(|s| s.frame_count).unwrap_or(0),
                    total = inner.segments.total_frames(),
                    "segment recorded"
                );
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, "dropped bookkeeping for capture event");
                Err(e)
            }
        }
    }

    /// Discard the whole recording and park the playback cursor at 0.
    ///
    /// Both happen under one lock acquisition so no tick can resolve the
    /// old cursor against the emptied timeline.
    pub fn flush(&self) {
        let mut inner = self.lock();
        inner.segments.flush();
        inner.position = 0;
    }

    /// Delete one segment from the recording.
    pub fn delete(&self, id: SegmentId) -> bool {
        let mut inner = self.lock();
        let deleted = inner.segments.delete(id);
        if deleted && inner.position >= inner.segments.total_frames() {
            inner.position = 0;
        }
        deleted
    }

    pub fn status(&self) -> PlaybackStatus {
        let inner = self.lock();
        PlaybackStatus {
            total_frames: inner.segments.total_frames(),
            total_segments: inner.segments.total_segments(),
            playback_position: inner.position,
            playback_rate: inner.rate,
        }
    }

    /// Run a read-only closure against the segment list.
    ///
    /// The closure must copy out what it needs; no reference may outlive
    /// the lock.
    pub fn with_segments<R>(&self, f: impl FnOnce(&SegmentList) -> R) -> R {
        f(&self.lock().segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> VideoState {
        VideoState::new(&BufferConfig {
            rec_start: 0,
            rec_stop: 1000,
            frame_size: 10,
        })
    }

    fn event(start: u64, end: u64, last: u64) -> CaptureEvent {
        CaptureEvent {
            start,
            end,
            last,
            meta: SegmentMeta {
                exposure: 250,
                interval: 1000,
                timebase: 1_000_000,
            },
        }
    }

    #[test]
    fn record_then_status() {
        let s = state();
        s.record(event(0, 490, 490)).unwrap();
        let st = s.status();
        assert_eq!(st.total_frames, 50);
        assert_eq!(st.total_segments, 1);
        assert_eq!(st.playback_position, 0);
        assert_eq!(st.playback_rate, 0);
    }

    #[test]
    fn flush_parks_the_cursor() {
        let s = state();
        s.record(event(0, 490, 490)).unwrap();
        s.lock().position = 30;
        s.flush();
        let st = s.status();
        assert_eq!(st.total_frames, 0);
        assert_eq!(st.playback_position, 0);
    }

    #[test]
    fn delete_pulls_cursor_back_in_range() {
        let s = state();
        let a = s.record(event(0, 490, 490)).unwrap();
        let _b = s.record(event(500, 790, 790)).unwrap();
        s.lock().position = 70;
        assert!(s.delete(a));
        let st = s.status();
        assert_eq!(st.total_frames, 30);
        assert_eq!(st.playback_position, 0);
    }
}
