//! Display hardware register access

use std::fs::OpenOptions;
use std::ptr;

use color_eyre::{eyre::eyre, Result};
use memmap2::MmapMut;
use tracing::info;

use crate::DisplayConfig;

/// Sink for the playback tick's hardware writes.
///
/// Only the tick handler holds a sink, so the two registers behind it
/// are never written from more than one place.
pub trait DisplaySink: Send {
    /// Latch `address` into the frame-address register and fire the
    /// manual sync strobe so the display logic fetches that frame.
    fn write_frame(&mut self, address: u64);

    /// Hand the display back to the live sensor feed.
    fn show_live(&mut self);
}

/// No-op sink for headless runs and dry starts.
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn write_frame(&mut self, _address: u64) {}
    fn show_live(&mut self) {}
}

/// Memory-mapped display register window.
///
/// Maps the FPGA's display register block and performs volatile 32-bit
/// writes at the configured offsets. The sync strobe is self-clearing in
/// hardware; writing 1 is sufficient.
pub struct MappedRegisters {
    map: MmapMut,
    frame_addr: usize,
    sync: usize,
    source: usize,
}

impl MappedRegisters {
    pub fn open(cfg: &DisplayConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&cfg.registers_path)?;
        // SAFETY: the register window is exclusive to this process; the
        // kernel driver exposes it as an ordinary mappable file.
        let map = unsafe { MmapMut::map_mut(&file)? };

        let end = cfg
            .frame_addr_offset
            .max(cfg.sync_offset)
            .max(cfg.source_offset)
            + 4;
        if map.len() < end {
            return Err(eyre!(
                "register window too small: {} bytes mapped, {} needed",
                map.len(),
                end
            ));
        }

        info!(path = %cfg.registers_path, len = map.len(), "display registers mapped");
        Ok(Self {
            map,
            frame_addr: cfg.frame_addr_offset,
            sync: cfg.sync_offset,
            source: cfg.source_offset,
        })
    }

    fn write_reg(&mut self, offset: usize, value: u32) {
        // SAFETY: offsets were bounds-checked against the mapping in
        // `open`, and register words are 4-byte aligned by config.
        unsafe {
            let base = self.map.as_mut_ptr();
            ptr::write_volatile(base.add(offset) as *mut u32, value);
        }
    }
}

impl DisplaySink for MappedRegisters {
    fn write_frame(&mut self, address: u64) {
        self.write_reg(self.frame_addr, address as u32);
        self.write_reg(self.sync, 1);
    }

    fn show_live(&mut self) {
        self.write_reg(self.source, 0);
    }
}
