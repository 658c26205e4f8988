//! Rotating async readback
//!
//! A small ring of staging buffers lets the CPU read GPU counters a few
//! frames late instead of stalling the queue. One slot is written per
//! frame; the newest finished slot wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Slot {
    buffer: wgpu::Buffer,
    ready: Arc<AtomicBool>,
    in_flight: bool,
}

pub struct ReadbackRing {
    slots: Vec<Slot>,
    cursor: usize,
    size: u64,
}

impl ReadbackRing {
    pub fn new(device: &wgpu::Device, label: &'static str, size: u64, depth: usize) -> Self {
        let slots = (0..depth.max(2))
            .map(|_| Slot {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                }),
                ready: Arc::new(AtomicBool::new(false)),
                in_flight: false,
            })
            .collect();
        Self {
            slots,
            cursor: 0,
            size,
        }
    }

    /// Record a copy of `src[offset..offset+size]` into the next free
    /// slot. Skips the frame when every slot is still in flight.
    pub fn stage_copy(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        src: &wgpu::Buffer,
        src_offset: u64,
    ) -> bool {
        let slot = &mut self.slots[self.cursor];
        if slot.in_flight {
            return false;
        }
        encoder.copy_buffer_to_buffer(src, src_offset, &slot.buffer, 0, self.size);
        slot.in_flight = true;
        slot.ready.store(false, Ordering::Release);
        self.cursor = (self.cursor + 1) % self.slots.len();
        true
    }

    /// Issue the map for the slot staged most recently. Call once per
    /// frame after submitting the encoder.
    pub fn after_submit(&mut self) {
        let last = (self.cursor + self.slots.len() - 1) % self.slots.len();
        let slot = &self.slots[last];
        if !slot.in_flight || slot.ready.load(Ordering::Acquire) {
            return;
        }
        let ready = Arc::clone(&slot.ready);
        slot.buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            if result.is_ok() {
                ready.store(true, Ordering::Release);
            }
        });
    }

    /// Non-blocking poll; returns the newest completed payload.
    pub fn poll(&mut self, device: &wgpu::Device) -> Option<Vec<u8>> {
        let _ = device.poll(wgpu::Maintain::Poll);
        let mut newest: Option<Vec<u8>> = None;
        // Walk backwards from the most recently staged slot.
        for step in 1..=self.slots.len() {
            let index = (self.cursor + self.slots.len() - step) % self.slots.len();
            let slot = &mut self.slots[index];
            if slot.in_flight && slot.ready.load(Ordering::Acquire) {
                if newest.is_none() {
                    let data = slot.buffer.slice(..).get_mapped_range().to_vec();
                    newest = Some(data);
                }
                slot.buffer.unmap();
                slot.in_flight = false;
                slot.ready.store(false, Ordering::Release);
            }
        }
        newest
    }
}
