pub mod display;
pub mod overlay;
pub mod playback;
pub mod recording;
pub mod state;

use serde::{Deserialize, Serialize};

pub use playback::{EndAction, PlaybackDriver, PlaybackLimit};
pub use recording::{ResolvedFrame, Segment, SegmentId, SegmentList, SegmentMeta};
pub use state::{CaptureEvent, PlaybackStatus, VideoState};

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub buffer: BufferConfig,
    pub playback: PlaybackConfig,
    pub display: DisplayConfig,
}

/// Circular recording region, in buffer-native address units.
///
/// Fixed by the sequencer configuration before the first trigger event
/// arrives; constant for the life of a recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferConfig {
    pub rec_start: u64,
    pub rec_stop: u64,
    pub frame_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Maximum display refresh rate in Hz; playback faster than this
    /// steps multiple frames per tick instead of ticking faster.
    pub refresh_hz: u32,
    pub command_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Mappable register window exposed by the FPGA platform driver.
    pub registers_path: String,
    pub frame_addr_offset: usize,
    pub sync_offset: usize,
    pub source_offset: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            playback: PlaybackConfig {
                refresh_hz: 60,
                command_depth: 16,
            },
            display: DisplayConfig {
                registers_path: "/dev/fpga-display".into(),
                frame_addr_offset: 0x40,
                sync_offset: 0x44,
                source_offset: 0x48,
            },
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            rec_start: 0,
            // 1 GiB recording region of 1.5 MiB frame slots.
            rec_stop: 0x4000_0000,
            frame_size: 0x18_0000,
        }
    }
}
