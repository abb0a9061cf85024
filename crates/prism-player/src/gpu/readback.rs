//! Depth-2 asynchronous GPU→CPU readback.
//!
//! Per tick the ring issues a copy into one staging buffer and maps the
//! other, the one written a full tick earlier. Mapping one-tick-old work is
//! what keeps the wait near zero: one frame of latency buys a render thread
//! that almost never stalls.

use wgpu::{Buffer, BufferDescriptor, BufferUsages, CommandEncoder, Device, Extent3d, Texture};

/// Lifecycle of one staging slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    WritePending,
    ReadReady,
}

/// Pure two-slot alternation state machine. Which slot is written next is
/// decided by a monotonic tick counter, never by ad-hoc index arithmetic at
/// the call sites, so the write/read slots can never collide.
#[derive(Debug)]
pub struct SlotRing {
    states: [SlotState; 2],
    tick: u64,
}

impl SlotRing {
    pub fn new() -> Self {
        Self {
            states: [SlotState::Idle; 2],
            tick: 0,
        }
    }

    /// Slot receiving this tick's copy.
    pub fn write_index(&self) -> usize {
        (self.tick % 2) as usize
    }

    /// Slot eligible for mapping this tick (written on the previous tick).
    pub fn read_index(&self) -> usize {
        1 - self.write_index()
    }

    /// Mark this tick's write slot as holding an in-flight copy.
    pub fn begin_write(&mut self) -> usize {
        let w = self.write_index();
        self.states[w] = SlotState::WritePending;
        w
    }

    /// Claim the read slot if it has a copy from the previous tick.
    pub fn take_readable(&mut self) -> Option<usize> {
        let r = self.read_index();
        if self.states[r] == SlotState::WritePending {
            self.states[r] = SlotState::ReadReady;
            Some(r)
        } else {
            None
        }
    }

    /// Release a slot after its data was consumed (or the map failed).
    pub fn finish_read(&mut self, index: usize) {
        self.states[index] = SlotState::Idle;
    }

    /// Swap write/read roles for the next tick.
    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// Forget in-flight copies. They complete on the GPU but are never
    /// mapped. Used when the processing path is disabled mid-stream.
    pub fn reset(&mut self) {
        self.states = [SlotState::Idle; 2];
    }
}

impl Default for SlotRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Double-buffered staging for CPU readback of a fixed-size texture.
pub struct AsyncReadbackRing {
    staging: [Buffer; 2],
    ring: SlotRing,
    width: u32,
    height: u32,
    /// Bytes per row, padded to wgpu's COPY_BYTES_PER_ROW_ALIGNMENT (256).
    padded_bytes_per_row: u32,
    /// Actual bytes per row (width * 4).
    unpadded_bytes_per_row: u32,
}

impl AsyncReadbackRing {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(padded_bytes_per_row) * u64::from(height);

        let staging = [
            device.create_buffer(&BufferDescriptor {
                label: Some("readback-staging-0"),
                size: buffer_size,
                usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
            device.create_buffer(&BufferDescriptor {
                label: Some("readback-staging-1"),
                size: buffer_size,
                usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
        ];

        Self {
            staging,
            ring: SlotRing::new(),
            width,
            height,
            padded_bytes_per_row,
            unpadded_bytes_per_row,
        }
    }

    /// Encode a copy of `texture` into this tick's write slot. Non-blocking;
    /// the copy executes whenever the GPU reaches it.
    pub fn begin_write(&mut self, encoder: &mut CommandEncoder, texture: &Texture) {
        let slot = self.ring.begin_write();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging[slot],
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Map the slot written on the previous tick and return its pixels as
    /// tightly packed RGBA rows. Call after submitting this tick's commands.
    ///
    /// May wait briefly if the GPU has not finished the one-tick-old copy;
    /// the wait is bounded by that copy, never by future work. A failed map
    /// is logged and yields `None`; the next tick retries by cadence, no
    /// backlog forms. Advances the ring either way.
    pub fn complete_read(&mut self, device: &Device) -> Option<Vec<u8>> {
        let result = match self.ring.take_readable() {
            Some(slot) => self.map_and_copy(device, slot),
            None => None, // nothing in flight (first tick, or just reset)
        };
        self.ring.advance();
        result
    }

    fn map_and_copy(&mut self, device: &Device, slot: usize) -> Option<Vec<u8>> {
        let buf = &self.staging[slot];
        let slice = buf.slice(..);

        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        // Wait drives the map callback for the copy submitted last tick
        let _ = device.poll(wgpu::PollType::wait_indefinitely());

        match rx.try_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("readback map failed: {e}");
                self.ring.finish_read(slot);
                return None;
            }
            Err(_) => {
                log::warn!("readback map did not resolve; skipping frame");
                // Cancel the outstanding request so the slot can be rewritten
                buf.unmap();
                self.ring.finish_read(slot);
                return None;
            }
        }

        let mapped = slice.get_mapped_range();
        let data = if self.padded_bytes_per_row == self.unpadded_bytes_per_row {
            mapped.to_vec()
        } else {
            // Strip row padding
            let mut out =
                Vec::with_capacity((self.unpadded_bytes_per_row * self.height) as usize);
            for row in 0..self.height {
                let start = (row * self.padded_bytes_per_row) as usize;
                let end = start + self.unpadded_bytes_per_row as usize;
                out.extend_from_slice(&mapped[start..end]);
            }
            out
        };
        drop(mapped);
        buf.unmap();
        self.ring.finish_read(slot);

        Some(data)
    }

    /// Drop any in-flight copies without mapping them.
    pub fn reset(&mut self) {
        self.ring.reset();
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Align `value` up to the next multiple of `alignment`.
fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_nothing_to_read() {
        let mut ring = SlotRing::new();
        ring.begin_write();
        assert_eq!(ring.take_readable(), None);
        ring.advance();
    }

    #[test]
    fn read_slot_is_previous_ticks_write_slot() {
        let mut ring = SlotRing::new();
        let mut last_write = None;

        for tick in 0..16 {
            let w = ring.begin_write();
            let readable = ring.take_readable();

            if tick == 0 {
                assert_eq!(readable, None);
            } else {
                let r = readable.expect("a copy from the previous tick");
                assert_eq!(Some(r), last_write, "tick {tick}");
                assert_ne!(r, w, "read and write slot collided on tick {tick}");
                ring.finish_read(r);
            }

            last_write = Some(w);
            ring.advance();
        }
    }

    #[test]
    fn write_index_alternates_deterministically() {
        let mut ring = SlotRing::new();
        for tick in 0..8 {
            assert_eq!(ring.write_index(), tick % 2);
            assert_eq!(ring.read_index(), 1 - tick % 2);
            ring.advance();
        }
    }

    #[test]
    fn failed_read_frees_the_slot_for_rewrite() {
        let mut ring = SlotRing::new();
        ring.begin_write();
        ring.advance();

        let slot = ring.take_readable().unwrap();
        ring.finish_read(slot); // map failure path releases without data

        ring.advance();
        // Two ticks later the same slot is the write target again
        assert_eq!(ring.write_index(), slot);
        ring.begin_write();
    }

    #[test]
    fn reset_discards_in_flight_copies() {
        let mut ring = SlotRing::new();
        ring.begin_write();
        ring.advance();
        ring.reset();

        // The stale copy must never surface as readable
        assert_eq!(ring.take_readable(), None);
    }

    #[test]
    fn align_to_copy_alignment() {
        assert_eq!(align_to(2560, 256), 2560);
        assert_eq!(align_to(2561, 256), 2816);
        assert_eq!(align_to(1, 256), 256);
    }
}
