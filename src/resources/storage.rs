//! Shader storage buffer slot.

use crate::context::GraphicsContext;
use crate::device::BufferTarget;
use crate::error::GpuResult;

use super::buffer::GpuBuffer;
use super::object::{GpuObject, GpuRef};

/// A shader storage buffer bound to a fixed binding index.
///
/// The slot owns at most one [`GpuBuffer`]. Growing or releasing the slot
/// only drops its owner reference; the releaser deletes the old buffer on
/// the context thread once no draw still holds it.
#[derive(Debug, Default)]
pub struct StorageBuffer {
    buffer: Option<GpuRef<GpuBuffer>>,
    allocated_size: u64,
    binding_index: Option<u32>,
}

impl StorageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty slot for binding point `index`.
    pub fn with_binding(index: u32) -> Self {
        Self {
            binding_index: Some(index),
            ..Self::default()
        }
    }

    pub fn binding_index(&self) -> Option<u32> {
        self.binding_index
    }

    pub fn set_binding_index(&mut self, index: u32) {
        self.binding_index = Some(index);
    }

    /// Size in bytes the current buffer was allocated for.
    pub fn allocated_size(&self) -> u64 {
        self.allocated_size
    }

    pub fn buffer(&self) -> Option<&GpuRef<GpuBuffer>> {
        self.buffer.as_ref()
    }

    /// Make sure a buffer of at least `size` bytes exists.
    ///
    /// Returns `true` if a new buffer was created, in which case the caller
    /// must upload its contents again.
    ///
    /// # Errors
    ///
    /// Propagates allocation failure; the previous buffer is kept in that case.
    pub fn reserve(
        &mut self,
        context: &GraphicsContext,
        size: u64,
        label: impl Into<String>,
    ) -> GpuResult<bool> {
        let current = self.buffer.as_ref().is_some_and(|b| b.is_valid());
        if current && self.allocated_size >= size {
            return Ok(false);
        }

        let buffer = GpuBuffer::create(BufferTarget::ShaderStorage, context, label)?;
        self.buffer = Some(buffer);
        self.allocated_size = size;
        Ok(true)
    }

    /// Bind the buffer to its binding point, if both are set.
    pub fn bind_layout(&self) {
        if let (Some(buffer), Some(index)) = (&self.buffer, self.binding_index)
            && buffer.is_valid()
        {
            buffer.bind_base(BufferTarget::ShaderStorage, index);
        }
    }

    /// Drop the buffer. The releaser deletes it once unreferenced.
    pub fn release(&mut self) {
        self.buffer = None;
        self.allocated_size = 0;
    }
}
