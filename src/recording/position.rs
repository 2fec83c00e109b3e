//! Logical frame position to physical address resolution

use super::seglist::{SegmentId, SegmentList};

/// Result of resolving a logical timeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub id: SegmentId,
    pub segno: u32,
    pub address: u64,
}

impl SegmentList {
    /// Map a logical frame index into a physical frame address.
    ///
    /// The timeline is the concatenation of all segments' frames in
    /// capture order; within a segment the rotation `offset` selects
    /// which physical slot is logical frame 0. Returns `None` past the
    /// end of the timeline; the caller picks the fallback.
    ///
    /// Pure and allocation-free: called once per display refresh from
    /// the playback tick, under the shared lock.
    pub fn resolve(&self, position: u64) -> Option<ResolvedFrame> {
        if position >= self.total_frames() {
            return None;
        }
        for (id, seg) in self.iter() {
            if position < seg.frameno + seg.frame_count {
                let localpos = position - seg.frameno;
                let relframe = (localpos + seg.offset) % seg.frame_count;
                let mut address = seg.start + relframe * seg.frame_size;
                // relframe < frame_count bounds the excursion to at most
                // one buffer length, so a single wrap suffices.
                if address >= self.rec_stop() {
                    address -= self.rec_stop() - self.rec_start();
                }
                return Some(ResolvedFrame {
                    id,
                    segno: seg.segno,
                    address,
                });
            }
        }
        None
    }
}
