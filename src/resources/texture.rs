//! GPU texture object with bindless residency.

use std::fmt;

use parking_lot::Mutex;

use crate::context::GraphicsContext;
use crate::device::{BindlessHandle, DeviceFeatures, ObjectKind, TextureTarget};
use crate::error::{GpuError, GpuResult};

use super::object::{GpuObject, GpuRef, ObjectHeader};

#[derive(Debug)]
struct BindlessState {
    handle: BindlessHandle,
    resident: bool,
}

/// A device texture object.
///
/// Besides plain binding, textures can expose a bindless handle. The handle
/// is resolved lazily by [`handle`](Self::handle) and must only be requested
/// after all texture state (format, filtering, mip levels) is final, because
/// resolution freezes that state on the device.
pub struct GpuTexture {
    header: ObjectHeader,
    target: TextureTarget,
    bindless: Mutex<BindlessState>,
}

impl GpuTexture {
    /// Allocate a texture on `context`, bind it once and register it for release.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::AllocationFailed`] if the device hands back the
    /// sentinel name.
    pub fn create(
        target: TextureTarget,
        context: &GraphicsContext,
        label: impl Into<String>,
    ) -> GpuResult<GpuRef<Self>> {
        let header = ObjectHeader::allocate(ObjectKind::Texture, context, label)?;
        let texture = GpuRef::new(Self {
            header,
            target,
            bindless: Mutex::new(BindlessState {
                handle: BindlessHandle::INVALID,
                resident: false,
            }),
        });

        texture.bind();
        texture.header.apply_label();
        context.releasers().watch(texture.tracking());

        log::trace!(
            "GpuTexture: created {} '{}' ({:?})",
            texture.name(),
            texture.label(),
            target
        );
        Ok(texture)
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    /// Bind to the texture's target. Context thread only.
    pub fn bind(&self) {
        self.header
            .device()
            .bind_texture(self.target, self.header.name());
    }

    /// Bindless handle, resolved on first use.
    ///
    /// Returns [`BindlessHandle::INVALID`] if the device cannot resolve one
    /// (no bindless support, denied, or already released). A failed
    /// resolution is not cached, so a later call may succeed.
    pub fn handle(&self) -> BindlessHandle {
        let mut state = self.bindless.lock();
        self.resolve(&mut state)
    }

    /// Like [`handle`](Self::handle), but reports failure as an error.
    pub fn try_handle(&self) -> GpuResult<BindlessHandle> {
        let handle = self.handle();
        if handle.is_valid() {
            Ok(handle)
        } else {
            Err(GpuError::ResolveFailed {
                label: self.header.label().to_string(),
            })
        }
    }

    /// Whether the bindless handle is currently resident.
    pub fn is_resident(&self) -> bool {
        self.bindless.lock().resident
    }

    /// Make the bindless handle resident or non-resident.
    ///
    /// Requesting the current state issues no device call. Making a texture
    /// resident resolves its handle first.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::ResolveFailed`] if the handle cannot be resolved.
    pub fn make_resident(&self, resident: bool) -> GpuResult<()> {
        let mut state = self.bindless.lock();
        if state.resident == resident {
            return Ok(());
        }

        if resident {
            let handle = self.resolve(&mut state);
            if !handle.is_valid() {
                return Err(GpuError::ResolveFailed {
                    label: self.header.label().to_string(),
                });
            }
            self.header.device().make_handle_resident(handle);
        } else {
            self.header.device().make_handle_non_resident(state.handle);
        }

        state.resident = resident;
        Ok(())
    }

    fn resolve(&self, state: &mut BindlessState) -> BindlessHandle {
        if state.handle.is_valid() {
            return state.handle;
        }

        let name = self.header.name();
        let device = self.header.device();
        if !name.is_valid() || !device.features().contains(DeviceFeatures::BINDLESS_TEXTURES) {
            return BindlessHandle::INVALID;
        }

        self.bind();
        state.handle = device.texture_handle(name);
        if !state.handle.is_valid() {
            log::debug!(
                "GpuTexture: no bindless handle for {} '{}'",
                name,
                self.header.label()
            );
        }
        state.handle
    }
}

impl GpuObject for GpuTexture {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn release(&self) -> GpuResult<()> {
        {
            let mut state = self.bindless.lock();
            if state.resident {
                self.header.device().make_handle_non_resident(state.handle);
                state.resident = false;
            }
            state.handle = BindlessHandle::INVALID;
        }
        self.header.delete()
    }
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.bindless.lock();
        f.debug_struct("GpuTexture")
            .field("name", &self.header.name())
            .field("target", &self.target)
            .field("label", &self.header.label())
            .field("handle", &state.handle)
            .field("resident", &state.resident)
            .finish()
    }
}

// Ensure GpuTexture is Send + Sync
static_assertions::assert_impl_all!(GpuTexture: Send, Sync);
