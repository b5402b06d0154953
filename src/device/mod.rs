//! Device capability consumed by the resource and job layers.
//!
//! A [`GpuDevice`] is the per-context object exposing the graphics API entry
//! points this crate needs: object allocation and deletion, binding, debug
//! labels and bindless residency. The host runtime supplies the real
//! implementation; [`dummy::DummyDevice`] records calls for tests and demos.
//!
//! # Thread affinity
//!
//! Every method except [`GpuDevice::context_id`] and [`GpuDevice::features`]
//! must be called on the thread that currently owns the context. This is a
//! documented precondition, not something the trait can check.

#[cfg(any(test, feature = "dummy"))]
pub mod dummy;

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

/// Identifier of a graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device-side object name.
///
/// [`ObjectName::INVALID`] is the "no object" sentinel returned by a failed
/// allocation and stored after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectName(pub u32);

impl ObjectName {
    /// Sentinel for "unallocated".
    pub const INVALID: Self = Self(u32::MAX);

    /// Returns `true` unless this is the sentinel.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#invalid")
        }
    }
}

/// Bindless texture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindlessHandle(pub u64);

impl BindlessHandle {
    /// Sentinel for "not resolved".
    pub const INVALID: Self = Self(u64::MAX);

    /// Returns `true` unless this is the sentinel.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Kind of device object, used for allocation, deletion and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer => f.write_str("buffer"),
            Self::Texture => f.write_str("texture"),
        }
    }
}

/// Binding target for buffer objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
    ShaderStorage,
    DrawIndirect,
    DispatchIndirect,
    CopyRead,
    CopyWrite,
    Texture,
}

impl BufferTarget {
    /// Whether the target has indexed binding points (`bind_buffer_base`).
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Uniform | Self::ShaderStorage)
    }
}

/// Binding target for texture objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture1d,
    Texture2d,
    Texture2dArray,
    Texture3d,
    CubeMap,
    CubeMapArray,
    Rectangle,
    Texture2dMultisample,
}

bitflags! {
    /// Optional device features the resource layer adapts to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFeatures: u32 {
        /// Objects can be given debug labels.
        const DEBUG_LABELS = 1 << 0;
        /// Bindless texture handles and residency are available.
        const BINDLESS_TEXTURES = 1 << 1;
    }
}

/// Errors reported by the device capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device rejected the call: {0}")]
    Rejected(String),
    #[error("graphics context lost")]
    ContextLost,
}

/// Per-context graphics API capability.
///
/// Implementations are shared behind `Arc<dyn GpuDevice>` by every resource
/// created on the context, so they must be `Send + Sync` even though the
/// device calls themselves are only legal on the owning thread.
pub trait GpuDevice: Send + Sync {
    /// Identifier of the context this capability belongs to.
    fn context_id(&self) -> ContextId;

    /// Optional features supported by this context.
    fn features(&self) -> DeviceFeatures;

    /// Allocate a new object name, or [`ObjectName::INVALID`] on failure.
    fn gen_object(&self, kind: ObjectKind) -> ObjectName;

    /// Delete an object previously returned by [`gen_object`](Self::gen_object).
    fn delete_object(&self, kind: ObjectKind, name: ObjectName) -> Result<(), DeviceError>;

    fn bind_buffer(&self, target: BufferTarget, name: ObjectName);

    /// Bind a buffer to an indexed binding point.
    fn bind_buffer_base(&self, target: BufferTarget, index: u32, name: ObjectName);

    fn bind_texture(&self, target: TextureTarget, name: ObjectName);

    /// Attach a debug label. Only called when [`DeviceFeatures::DEBUG_LABELS`] is set.
    fn object_label(&self, kind: ObjectKind, name: ObjectName, label: &str);

    /// Resolve a bindless handle for a bound texture, or [`BindlessHandle::INVALID`].
    fn texture_handle(&self, name: ObjectName) -> BindlessHandle;

    fn make_handle_resident(&self, handle: BindlessHandle);

    fn make_handle_non_resident(&self, handle: BindlessHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(!ObjectName::INVALID.is_valid());
        assert!(ObjectName(0).is_valid());
        assert!(!BindlessHandle::INVALID.is_valid());
        assert!(BindlessHandle(1).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(ObjectName(12).to_string(), "#12");
        assert_eq!(ObjectName::INVALID.to_string(), "#invalid");
        assert_eq!(ContextId(3).to_string(), "3");
        assert_eq!(ObjectKind::Texture.to_string(), "texture");
    }

    #[test]
    fn test_indexed_targets() {
        assert!(BufferTarget::ShaderStorage.is_indexed());
        assert!(BufferTarget::Uniform.is_indexed());
        assert!(!BufferTarget::Array.is_indexed());
    }
}
