//! Segment geometry for one trigger's capture run

/// Fixed bounds of the circular recording region in DRAM.
///
/// `rec_start`/`rec_stop` delimit the region in buffer-native address
/// units; `frame_size` is the stride of one frame slot in the same units.
/// All three are set once by the sequencer configuration and never change
/// while a recording exists.
#[derive(Debug, Clone, Copy)]
pub struct BufferBounds {
    pub rec_start: u64,
    pub rec_stop: u64,
    pub frame_size: u64,
}

/// Timing metadata reported by hardware with each trigger event.
///
/// `exposure` and `interval` are tick counts against `timebase` ticks per
/// second. Read-only after creation; consumed by export headers and the
/// on-screen overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentMeta {
    pub exposure: u64,
    pub interval: u64,
    pub timebase: u64,
}

/// One contiguous (possibly wrapped) run of captured frames.
///
/// `start`/`end` are the physical addresses of the first and last frame
/// slot as reported by hardware; `end < start` means the run wrapped past
/// `rec_stop` back through `rec_start`. `last` is where hardware was about
/// to write next when capture stopped, which determines the rotation
/// `offset` of logical frame 0 within the run.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
    pub last: u64,
    pub frame_size: u64,
    /// Number of frame slots spanned, wraparound included.
    pub frame_count: u64,
    /// Rotation in frames: which physical slot holds logical frame 0.
    pub offset: u64,
    /// Index of this segment in capture order. Owned by the list,
    /// recomputed on every structural change.
    pub segno: u32,
    /// Cumulative frame count of all prior segments. Owned by the list,
    /// recomputed on every structural change.
    pub frameno: u64,
    pub meta: SegmentMeta,
}

impl Segment {
    /// Build a segment from a raw hardware capture report.
    ///
    /// `frame_count` and `offset` are derived here, once. The branch
    /// structure of the wrapped-case `offset` computation (`last < end`
    /// vs `last != end` vs `last == end`) mirrors observed hardware
    /// behavior; confirm against hardware before changing it.
    pub(crate) fn new(bounds: BufferBounds, start: u64, end: u64, last: u64, meta: SegmentMeta) -> Self {
        let fs = bounds.frame_size.max(1);
        let (frame_count, offset) = if end >= start {
            let count = 1 + (end - start) / fs;
            let offset = if last >= end {
                0
            } else {
                last.saturating_sub(start) / fs + 1
            };
            (count, offset)
        } else {
            let count = 1
                + bounds.rec_stop.saturating_sub(start) / fs
                + end.saturating_sub(bounds.rec_start) / fs;
            let offset = if last < end {
                count.saturating_sub((end - last) / fs)
            } else if last != end {
                last.saturating_sub(start) / fs + 1
            } else {
                0
            };
            (count, offset)
        };

        Self {
            start,
            end,
            last,
            frame_size: fs,
            frame_count,
            offset,
            segno: 0,
            frameno: 0,
            meta,
        }
    }

    /// Whether `address` falls inside this segment's physical range.
    pub fn contains(&self, address: u64) -> bool {
        if self.end >= self.start {
            address >= self.start && address <= self.end
        } else {
            // Wrapped run: everything above start or below end.
            address >= self.start || address <= self.end
        }
    }

    /// Whether two segments share any physical addresses.
    ///
    /// Endpoint containment is sufficient: both ranges are single
    /// contiguous-or-wrapped spans of the same circular buffer.
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.contains(other.start)
            || self.contains(other.end)
            || other.contains(self.start)
            || other.contains(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: BufferBounds = BufferBounds {
        rec_start: 0,
        rec_stop: 1000,
        frame_size: 10,
    };

    fn seg(start: u64, end: u64, last: u64) -> Segment {
        Segment::new(BOUNDS, start, end, last, SegmentMeta::default())
    }

    #[test]
    fn contiguous_full_region() {
        let s = seg(0, 990, 990);
        assert_eq!(s.frame_count, 100);
        assert_eq!(s.offset, 0);
    }

    #[test]
    fn contiguous_stopped_mid_run() {
        // Hardware stopped with the write pointer inside the run: the
        // oldest valid frame sits just past it.
        let s = seg(0, 990, 500);
        assert_eq!(s.frame_count, 100);
        assert_eq!(s.offset, 51);
    }

    #[test]
    fn wrapped_run() {
        let s = seg(950, 40, 40);
        assert_eq!(s.frame_count, 10);
        assert_eq!(s.offset, 0);
    }

    #[test]
    fn wrapped_write_pointer_below_end() {
        let s = seg(950, 40, 20);
        assert_eq!(s.frame_count, 10);
        assert_eq!(s.offset, 10 - 2);
    }

    #[test]
    fn wrapped_write_pointer_above_start() {
        let s = seg(950, 40, 970);
        assert_eq!(s.frame_count, 10);
        assert_eq!(s.offset, 3);
    }

    #[test]
    fn single_frame_segment() {
        let s = seg(500, 500, 500);
        assert_eq!(s.frame_count, 1);
        assert_eq!(s.offset, 0);
    }

    #[test]
    fn contains_contiguous() {
        let s = seg(100, 290, 290);
        assert!(s.contains(100));
        assert!(s.contains(200));
        assert!(s.contains(290));
        assert!(!s.contains(90));
        assert!(!s.contains(300));
    }

    #[test]
    fn contains_wrapped() {
        let s = seg(950, 40, 40);
        assert!(s.contains(950));
        assert!(s.contains(990));
        assert!(s.contains(0));
        assert!(s.contains(40));
        assert!(!s.contains(50));
        assert!(!s.contains(940));
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = seg(0, 90, 90);
        let b = seg(200, 40, 40); // wrapped, covers a's low end
        let c = seg(100, 190, 190);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!b.overlaps(&c));
        assert!(!c.overlaps(&b));
    }
}
