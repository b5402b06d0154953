//! Shared setup for the integration suites.
//!
//! Every test builds its own [`TestContext`] around a [`DummyDevice`], so
//! device call counts are never shared between tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gpu_arena::device::dummy::DummyDevice;
use gpu_arena::{
    ArenaConfig, ContextId, DeviceFeatures, GraphicsContext, JobArena, ReleaserRegistry,
};

/// One dummy device wrapped in a graphics context.
pub struct TestContext {
    pub device: Arc<DummyDevice>,
    pub context: GraphicsContext,
}

impl TestContext {
    /// Context `id` with its own releaser registry.
    pub fn new(id: u32) -> Self {
        Self::with_registry(id, Arc::new(ReleaserRegistry::new()))
    }

    /// Context `id` sharing `releasers` with other contexts.
    pub fn with_registry(id: u32, releasers: Arc<ReleaserRegistry>) -> Self {
        let device = Arc::new(DummyDevice::new(ContextId(id)));
        let context = GraphicsContext::new(device.clone(), releasers);
        Self { device, context }
    }

    #[allow(dead_code)]
    pub fn with_features(id: u32, features: DeviceFeatures) -> Self {
        let device = Arc::new(DummyDevice::with_features(ContextId(id), features));
        let context = GraphicsContext::new(device.clone(), Arc::new(ReleaserRegistry::new()));
        Self { device, context }
    }

    pub fn id(&self) -> ContextId {
        self.context.id()
    }

    /// Objects tracked by this context's releaser.
    #[allow(dead_code)]
    pub fn tracked(&self) -> usize {
        self.context.releasers().tracked_count(self.id())
    }
}

/// Arena with the given time slice, bound to nothing.
#[allow(dead_code)]
pub fn arena(name: &str, slice_ms: u64) -> Arc<JobArena> {
    Arc::new(JobArena::new(
        name,
        ArenaConfig::default().with_time_slice(Duration::from_millis(slice_ms)),
    ))
}

/// Spin for at least `duration` without yielding the thread.
#[allow(dead_code)]
pub fn busy_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

/// Install a test logger once; later calls are ignored.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
