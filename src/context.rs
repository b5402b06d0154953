//! Graphics context handle passed to resources and GPU jobs.

use std::fmt;
use std::sync::Arc;

use crate::device::{ContextId, GpuDevice};
use crate::releaser::ReleaserRegistry;

/// A live graphics context: its device capability plus the releaser
/// registry resources created on it register with.
///
/// Cloning is cheap (two `Arc`s). Jobs drained by a [`JobArena`] receive a
/// reference to the context they run on.
///
/// [`JobArena`]: crate::arena::JobArena
#[derive(Clone)]
pub struct GraphicsContext {
    device: Arc<dyn GpuDevice>,
    releasers: Arc<ReleaserRegistry>,
}

impl GraphicsContext {
    /// Create a context handle from a device and the registry its resources use.
    pub fn new(device: Arc<dyn GpuDevice>, releasers: Arc<ReleaserRegistry>) -> Self {
        Self { device, releasers }
    }

    /// Context identifier, taken from the device.
    pub fn id(&self) -> ContextId {
        self.device.context_id()
    }

    /// The device capability of this context.
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /// The releaser registry resources of this context register with.
    pub fn releasers(&self) -> &Arc<ReleaserRegistry> {
        &self.releasers
    }
}

impl fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("id", &self.id())
            .field("features", &self.device.features())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(GraphicsContext: Send, Sync);
