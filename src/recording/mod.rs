pub mod position;
pub mod segment;
pub mod seglist;

pub use position::ResolvedFrame;
pub use segment::{BufferBounds, Segment, SegmentMeta};
pub use seglist::{SegmentError, SegmentId, SegmentList};
