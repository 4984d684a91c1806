//! Fixed-capacity GPU buffers updated in place with sub-range writes.

use std::fmt;

use super::error::BufferError;

/// What a [`DynamicBuffer`] holds; decides its usage flags.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Vertex,
    Index,
}

impl BufferKind {
    fn usage(self) -> wgpu::BufferUsages {
        match self {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            BufferKind::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Vertex => f.write_str("vertex"),
            BufferKind::Index => f.write_str("index"),
        }
    }
}

/// Checks a write of `len` bytes at `offset` against a buffer of `capacity` bytes.
///
/// wgpu requires copy offsets and sizes to be multiples of
/// [`wgpu::COPY_BUFFER_ALIGNMENT`].
pub fn check_write(kind: BufferKind, capacity: u64, offset: u64, len: u64) -> Result<(), BufferError> {
    let required = offset.checked_add(len).unwrap_or(u64::MAX);
    if required > capacity {
        return Err(BufferError::Overflow {
            kind,
            required,
            capacity,
        });
    }
    if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(BufferError::Misaligned { kind, offset, len });
    }
    Ok(())
}

/// A device buffer allocated once and overwritten every frame.
///
/// The buffer is never reallocated: a batch larger than `capacity` is rejected
/// with [`BufferError::Overflow`] before anything is written.
pub struct DynamicBuffer {
    kind: BufferKind,
    buffer: wgpu::Buffer,
    capacity: u64,
    /// End of the most recent write; the range bound for drawing.
    filled: u64,
}

impl DynamicBuffer {
    /// Allocates `capacity` bytes (rounded up to the copy alignment).
    pub fn new(device: &wgpu::Device, kind: BufferKind, capacity: u64, label: &str) -> Self {
        let capacity = wgpu::util::align_to(
            capacity.max(wgpu::COPY_BUFFER_ALIGNMENT),
            wgpu::COPY_BUFFER_ALIGNMENT,
        );

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: kind.usage(),
            mapped_at_creation: false,
        });
        log::debug!("{label}: allocated {kind} buffer ({capacity} bytes)");

        Self {
            kind,
            buffer,
            capacity,
            filled: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes covered by the last write (`offset + len`).
    #[inline]
    pub fn filled(&self) -> u64 {
        self.filled
    }

    /// Whether `len` bytes written at offset 0 would fit.
    pub fn check(&self, len: u64) -> Result<(), BufferError> {
        check_write(self.kind, self.capacity, 0, len)
    }

    /// Overwrites `data.len()` bytes at `offset` without reallocating.
    pub fn write(&mut self, queue: &wgpu::Queue, offset: u64, data: &[u8]) -> Result<(), BufferError> {
        let len = data.len() as u64;
        check_write(self.kind, self.capacity, offset, len)?;

        if len > 0 {
            queue.write_buffer(&self.buffer, offset, data);
        }
        self.filled = offset + len;
        Ok(())
    }

    /// The written prefix, for binding on a render pass.
    ///
    /// Returns `None` if nothing has been written yet.
    pub fn filled_slice(&self) -> Option<wgpu::BufferSlice<'_>> {
        (self.filled > 0).then(|| self.buffer.slice(..self.filled))
    }

    /// Releases the device memory. Consumes the handle, so it cannot be used again.
    pub fn destroy(self) {
        self.buffer.destroy();
        log::debug!("destroyed {} buffer ({} bytes)", self.kind, self.capacity);
    }
}
