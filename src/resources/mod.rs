//! GPU resources.
//!
//! This module contains the device object wrappers:
//! - [`GpuBuffer`] - buffer object
//! - [`GpuTexture`] - texture object with optional bindless residency
//! - [`StorageBuffer`] - shader storage buffer slot built on [`GpuBuffer`]
//!
//! Objects are handed out as [`GpuRef`] owner handles. The context's
//! [`ResourceReleaser`](crate::releaser::ResourceReleaser) keeps an extra,
//! uncounted reference and deletes the device object on the context thread
//! once the last owner is gone.

mod buffer;
mod object;
mod storage;
mod texture;

pub use buffer::GpuBuffer;
pub use object::{GpuObject, GpuRef, ObjectHeader, ObjectId};
pub use storage::StorageBuffer;
pub use texture::GpuTexture;
