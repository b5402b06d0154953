//! Per-frame systems run on the context thread.
//!
//! A [`FrameDriver`] owns one [`GraphicsContext`] and runs its registered
//! [`FrameSystem`]s once per frame, in registration order. Two systems ship
//! with the crate:
//!
//! - [`ArenaConnector`] binds a [`JobArena`] to the context on first use and
//!   drains it every frame.
//! - [`ReleaserSweep`] reclaims GPU objects nobody owns anymore.
//!
//! Systems are not part of any culling or batching, so they run every frame.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::arena::{ArenaRegistry, DrainStats, JobArena};
use crate::context::GraphicsContext;
use crate::device::ContextId;
use crate::releaser::SweepReport;

/// Work executed once per frame on the thread owning the context.
pub trait FrameSystem: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn run(&mut self, context: &GraphicsContext);

    /// Called once by [`FrameDriver::teardown`] before the context's objects
    /// are released.
    fn teardown(&mut self, _context: &GraphicsContext) {}
}

/// Binds a job arena to the frame's context and drains it.
///
/// Dropping the connector unbinds the arena if it is still bound to the
/// context the connector attached it to. Tearing it down shuts the arena
/// down, so futures of jobs that will never run are abandoned.
pub struct ArenaConnector {
    arena: Arc<JobArena>,
    attached: Option<ContextId>,
    last: DrainStats,
}

impl ArenaConnector {
    pub fn new(arena: Arc<JobArena>) -> Self {
        Self {
            arena,
            attached: None,
            last: DrainStats::default(),
        }
    }

    pub fn arena(&self) -> &Arc<JobArena> {
        &self.arena
    }

    /// Stats of the most recent drain.
    pub fn last_drain(&self) -> DrainStats {
        self.last
    }
}

impl FrameSystem for ArenaConnector {
    fn name(&self) -> &str {
        "ArenaConnector"
    }

    fn run(&mut self, context: &GraphicsContext) {
        if !self.arena.bind_if_unbound(context) {
            log::debug!(
                "JobArena '{}' belongs to another context, not draining on {}",
                self.arena.name(),
                context.id()
            );
            return;
        }
        self.attached = Some(context.id());

        match self.arena.drain(context) {
            Ok(stats) => self.last = stats,
            Err(e) => log::warn!("ArenaConnector: {}", e),
        }
    }

    fn teardown(&mut self, context: &GraphicsContext) {
        if let Some(bound) = self.arena.bound_context_id()
            && bound != context.id()
        {
            return;
        }

        let dropped = self.arena.shutdown();
        if dropped > 0 {
            log::warn!(
                "ArenaConnector: context {} torn down with {} job(s) pending",
                context.id(),
                dropped
            );
        }
    }
}

impl Drop for ArenaConnector {
    fn drop(&mut self) {
        if let Some(id) = self.attached
            && self.arena.bound_context_id() == Some(id)
        {
            self.arena.bind_context(None);
        }
    }
}

impl fmt::Debug for ArenaConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaConnector")
            .field("arena", &self.arena.name())
            .field("attached", &self.attached)
            .field("last", &self.last)
            .finish()
    }
}

/// Sweeps the context's releaser every frame.
#[derive(Debug, Default)]
pub struct ReleaserSweep {
    released_total: usize,
}

impl ReleaserSweep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects released by this system so far.
    pub fn released_total(&self) -> usize {
        self.released_total
    }
}

impl FrameSystem for ReleaserSweep {
    fn name(&self) -> &str {
        "ReleaserSweep"
    }

    fn run(&mut self, context: &GraphicsContext) {
        let report = context.releasers().sweep(context.id());
        self.released_total += report.released;
    }
}

/// Minimal frame loop for one context.
///
/// [`teardown`](Self::teardown) releases everything still tracked for the
/// context exactly once and must be called on the render thread. Dropping
/// the driver tears it down only when the drop happens on the render thread
/// (the thread that created it or last ran [`frame`](Self::frame)); a drop
/// anywhere else logs a warning and issues no device calls.
pub struct FrameDriver {
    context: GraphicsContext,
    systems: Vec<Box<dyn FrameSystem>>,
    frame_index: u64,
    render_thread: ThreadId,
    torn_down: bool,
}

impl FrameDriver {
    pub fn new(context: GraphicsContext) -> Self {
        Self {
            context,
            systems: Vec::new(),
            frame_index: 0,
            render_thread: thread::current().id(),
            torn_down: false,
        }
    }

    /// Driver with an [`ArenaConnector`] for the context's arena in
    /// `arenas`, followed by a [`ReleaserSweep`].
    pub fn with_default_systems(context: GraphicsContext, arenas: &ArenaRegistry) -> Self {
        let arena = arenas.arena_for(context.id());
        let mut driver = Self::new(context);
        driver.add_system(ArenaConnector::new(arena));
        driver.add_system(ReleaserSweep::new());
        driver
    }

    pub fn add_system(&mut self, system: impl FrameSystem + 'static) {
        log::debug!(
            "FrameDriver[{}]: added system '{}'",
            self.context.id(),
            system.name()
        );
        self.systems.push(Box::new(system));
    }

    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    /// Number of frames run so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Run every system once. Does nothing after teardown.
    pub fn frame(&mut self) {
        if self.torn_down {
            log::warn!("FrameDriver[{}]: frame after teardown", self.context.id());
            return;
        }

        self.render_thread = thread::current().id();
        for system in &mut self.systems {
            log::trace!("Frame {}: {}", self.frame_index, system.name());
            system.run(&self.context);
        }
        self.frame_index += 1;
    }

    /// Tear down and drop all systems, then release every object tracked
    /// for the context. Render thread only.
    ///
    /// Only the first call touches the device; later calls return an empty
    /// report.
    pub fn teardown(&mut self) -> SweepReport {
        if self.torn_down {
            return SweepReport::default();
        }
        self.torn_down = true;
        for system in &mut self.systems {
            system.teardown(&self.context);
        }
        self.systems.clear();

        let report = self.context.releasers().release_all(self.context.id());
        log::info!(
            "FrameDriver[{}]: teardown after {} frames, released {} objects",
            self.context.id(),
            self.frame_index,
            report.released
        );
        report
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        if thread::current().id() == self.render_thread {
            self.teardown();
        } else {
            log::warn!(
                "FrameDriver[{}]: dropped off the render thread without teardown, \
                 {} object(s) left to the releaser",
                self.context.id(),
                self.context.releasers().tracked_count(self.context.id())
            );
        }
    }
}

impl fmt::Debug for FrameDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.systems.iter().map(|s| s.name()).collect();
        f.debug_struct("FrameDriver")
            .field("context", &self.context.id())
            .field("systems", &names)
            .field("frame_index", &self.frame_index)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
