//! # gpu-arena
//!
//! GPU object lifetime management and time-sliced job execution for
//! renderers with several graphics contexts and worker threads.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GpuBuffer`], [`GpuTexture`], [`StorageBuffer`] - device objects owned
//!   through counted [`GpuRef`] handles
//! - [`ReleaserRegistry`] - per-context deferred release, run on the context
//!   thread once nobody owns an object anymore
//! - [`JobArena`] / [`ArenaRegistry`] - queues of closures that must run on
//!   a context thread, drained each frame under a time budget
//! - [`Promise`] / [`SharedFuture`] - single-assignment results handed back
//!   to any thread, with cancellable waits
//! - [`FrameDriver`] - a per-context frame loop running [`FrameSystem`]s
//! - [`GpuDevice`] - the capability trait a graphics API binding implements,
//!   with a recording [`DummyDevice`](device::dummy::DummyDevice) for tests
//!
//! ## Example
//!
//! ```ignore
//! use gpu_arena::{ArenaRegistry, FrameDriver, GraphicsContext, ReleaserRegistry};
//!
//! let arenas = ArenaRegistry::from_env();
//! let context = GraphicsContext::new(device, Arc::new(ReleaserRegistry::new()));
//! let mut driver = FrameDriver::with_default_systems(context.clone(), &arenas);
//!
//! // Worker thread:
//! let texture = arenas.arena_for(context.id()).dispatch_with_result(|ctx| {
//!     GpuTexture::create(TextureTarget::Texture2d, ctx, "tile")
//! });
//!
//! // Render thread, every frame:
//! driver.frame();
//!
//! // Context shutdown:
//! driver.teardown();
//! ```

pub mod arena;
pub mod cancel;
pub mod compile;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod frame;
pub mod promise;
pub mod releaser;
pub mod resources;

pub use arena::{ArenaRegistry, DrainStats, JobArena};
pub use cancel::CancellationToken;
pub use compile::ObjectsCompiler;
pub use config::ArenaConfig;
pub use context::GraphicsContext;
pub use device::{
    BindlessHandle, BufferTarget, ContextId, DeviceError, DeviceFeatures, GpuDevice, ObjectKind,
    ObjectName, TextureTarget,
};
pub use error::{GpuError, GpuResult};
pub use frame::{ArenaConnector, FrameDriver, FrameSystem, ReleaserSweep};
pub use promise::{Promise, SharedFuture};
pub use releaser::{ReleaserRegistry, ResourceReleaser, SweepReport};
pub use resources::{GpuBuffer, GpuObject, GpuRef, GpuTexture, ObjectId, StorageBuffer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
///
/// Optional; nothing in the crate depends on it having been called.
pub fn init() {
    log::info!("gpu-arena v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_registry_has_default_arena() {
        let arenas = ArenaRegistry::default();
        assert_eq!(arenas.default_arena().name(), "default");
        assert!(arenas.context_ids().is_empty());
    }
}
