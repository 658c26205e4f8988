//! Append-then-upload storage buffers
//!
//! CPU side is cleared and repopulated every frame that updates, then
//! bulk-copied in one `write_buffer`. The GPU buffer grows exponentially
//! with 256-byte alignment and never shrinks; there are no per-element
//! updates.

use bytemuck::Pod;

const ALIGNMENT: u64 = 256;

pub struct DynamicBuffer<T: Pod> {
    label: &'static str,
    usage: wgpu::BufferUsages,
    items: Vec<T>,
    buffer: Option<wgpu::Buffer>,
    capacity_bytes: u64,
}

impl<T: Pod> DynamicBuffer<T> {
    pub fn new(label: &'static str, usage: wgpu::BufferUsages) -> Self {
        Self {
            label,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            items: Vec::new(),
            buffer: None,
            capacity_bytes: 0,
        }
    }

    /// Storage buffer preset used by the object/tile tables.
    pub fn storage(label: &'static str) -> Self {
        Self::new(label, wgpu::BufferUsages::STORAGE)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Append one element; the returned index is its GPU-side address.
    pub fn push(&mut self, item: T) -> u32 {
        let address = self.items.len() as u32;
        self.items.push(item);
        address
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Upload the CPU vector in one copy, growing the GPU buffer when the
    /// payload outgrew it.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.items.is_empty() {
            return;
        }
        let needed = (self.items.len() * std::mem::size_of::<T>()) as u64;
        if self.buffer.is_none() || needed > self.capacity_bytes {
            let grown = (needed * 3 / 2).max(ALIGNMENT);
            self.capacity_bytes = grown.div_ceil(ALIGNMENT) * ALIGNMENT;
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: self.capacity_bytes,
                usage: self.usage,
                mapped_at_creation: false,
            }));
            log::trace!("{}: grown to {} bytes", self.label, self.capacity_bytes);
        }
        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.items));
        }
    }

    /// GPU buffer, present after the first non-empty `upload`.
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_sequential() {
        let mut buf: DynamicBuffer<[f32; 4]> = DynamicBuffer::storage("test");
        assert_eq!(buf.push([0.0; 4]), 0);
        assert_eq!(buf.push([1.0; 4]), 1);
        buf.clear();
        assert_eq!(buf.push([2.0; 4]), 0);
    }

    #[test]
    fn test_capacity_stays_zero_without_upload() {
        let mut buf: DynamicBuffer<u32> = DynamicBuffer::storage("test");
        buf.push(7);
        assert_eq!(buf.capacity_bytes(), 0);
        assert!(buf.buffer().is_none());
    }
}
