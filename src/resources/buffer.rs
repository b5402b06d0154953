//! GPU buffer object.

use std::fmt;

use crate::context::GraphicsContext;
use crate::device::{BufferTarget, ObjectKind};
use crate::error::GpuResult;

use super::object::{GpuObject, GpuRef, ObjectHeader};

/// A device buffer object.
///
/// Created with [`GpuBuffer::create`], which registers the buffer with its
/// context's releaser. The buffer stays alive while any [`GpuRef`] to it
/// exists and is deleted on the context thread by the next sweep after the
/// last one is dropped.
///
/// # Example
///
/// ```ignore
/// let vertices = GpuBuffer::create(BufferTarget::Array, &ctx, "road vertices")?;
/// arena.dispatch({
///     let vertices = vertices.clone();
///     move |_ctx| vertices.bind()
/// });
/// ```
pub struct GpuBuffer {
    header: ObjectHeader,
    target: BufferTarget,
}

impl GpuBuffer {
    /// Allocate a buffer on `context`, bind it once and register it for release.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::AllocationFailed`](crate::GpuError::AllocationFailed)
    /// if the device hands back the sentinel name. Nothing is registered then.
    pub fn create(
        target: BufferTarget,
        context: &GraphicsContext,
        label: impl Into<String>,
    ) -> GpuResult<GpuRef<Self>> {
        let header = ObjectHeader::allocate(ObjectKind::Buffer, context, label)?;
        let buffer = GpuRef::new(Self { header, target });

        buffer.bind();
        buffer.header.apply_label();
        context.releasers().watch(buffer.tracking());

        log::trace!(
            "GpuBuffer: created {} '{}' ({:?})",
            buffer.name(),
            buffer.label(),
            target
        );
        Ok(buffer)
    }

    /// The target this buffer was created for.
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Bind to the buffer's own target. Context thread only.
    pub fn bind(&self) {
        self.bind_to(self.target);
    }

    /// Bind to a different target. Context thread only.
    pub fn bind_to(&self, target: BufferTarget) {
        self.header.device().bind_buffer(target, self.header.name());
    }

    /// Bind to an indexed binding point of `target`. Context thread only.
    pub fn bind_base(&self, target: BufferTarget, index: u32) {
        self.header
            .device()
            .bind_buffer_base(target, index, self.header.name());
    }
}

impl GpuObject for GpuBuffer {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn release(&self) -> GpuResult<()> {
        self.header.delete()
    }
}

impl fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("name", &self.header.name())
            .field("target", &self.target)
            .field("label", &self.header.label())
            .finish()
    }
}

// Ensure GpuBuffer is Send + Sync
static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);
