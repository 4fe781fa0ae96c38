//! Growable typed storage buffers.
//!
//! A buffer only grows: when an upload exceeds its capacity it is replaced
//! by one twice the needed size, and the caller is told so it can rebuild
//! bind groups.

use std::marker::PhantomData;

/// Smallest buffer allocated, in bytes. Storage bindings may not be empty.
pub const MIN_BUFFER_BYTES: usize = 64;

/// Capacity to grow to when `needed` bytes exceed `capacity`, if any.
///
/// Doubles the request, growing by at least 1 KiB.
#[must_use]
pub fn grown_capacity(capacity: usize, needed: usize) -> Option<usize> {
    (needed > capacity).then(|| (needed * 2).max(capacity + 1024))
}

/// A storage buffer of `T` records that grows on demand.
#[derive(Debug)]
pub struct DynamicBuffer<T> {
    buffer: wgpu::Buffer,
    capacity: usize,
    len: usize,
    usage: wgpu::BufferUsages,
    label: String,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> DynamicBuffer<T> {
    /// Empty buffer with room for `capacity` records.
    #[must_use]
    pub fn with_capacity(
        device: &wgpu::Device,
        label: &str,
        capacity: usize,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let bytes = (capacity * size_of::<T>()).max(MIN_BUFFER_BYTES);
        Self {
            buffer: Self::allocate(device, label, bytes, usage),
            capacity: bytes,
            len: 0,
            usage,
            label: label.to_owned(),
            _marker: PhantomData,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        label: &str,
        bytes: usize,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Upload `data`, growing first if it does not fit.
    ///
    /// Returns `true` if the buffer was reallocated (bind groups need
    /// recreation).
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[T],
    ) -> bool {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let grown = grown_capacity(self.capacity, bytes.len());
        if let Some(capacity) = grown {
            log::info!("growing '{}' to {} bytes", self.label, capacity);
            self.buffer = Self::allocate(device, &self.label, capacity, self.usage);
            self.capacity = capacity;
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
        self.len = data.len();
        grown.is_some()
    }

    /// The underlying wgpu buffer.
    #[must_use]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Records written by the last upload.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the last upload was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Records that fit without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity / size_of::<T>()
    }
}
