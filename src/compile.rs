//! GPU compilation scheduled through a job arena.
//!
//! Compiling GPU state (uploading textures, creating buffers, building
//! programs) has to happen on the context thread. [`ObjectsCompiler`] wraps
//! such work as an arena job and hands back a [`SharedFuture<bool>`] that
//! resolves to whether the compile succeeded.

use std::sync::Arc;

use crate::arena::JobArena;
use crate::cancel::CancellationToken;
use crate::context::GraphicsContext;
use crate::error::GpuResult;
use crate::promise::SharedFuture;

/// Schedules compile jobs on one [`JobArena`].
#[derive(Debug, Clone)]
pub struct ObjectsCompiler {
    arena: Arc<JobArena>,
}

impl ObjectsCompiler {
    pub fn new(arena: Arc<JobArena>) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &Arc<JobArena> {
        &self.arena
    }

    /// Queue `compile` and return a future resolving to its success.
    ///
    /// A failed compile resolves to `false` and is logged; the error does not
    /// leave the context thread.
    pub fn compile_async<F>(&self, label: impl Into<String>, compile: F) -> SharedFuture<bool>
    where
        F: FnOnce(&GraphicsContext) -> GpuResult<()> + Send + 'static,
    {
        let label = label.into();
        self.arena.dispatch_with_result(move |context| match compile(context) {
            Ok(()) => {
                log::trace!("Compiled '{}' on context {}", label, context.id());
                true
            }
            Err(e) => {
                log::warn!("Compile of '{}' failed on context {}: {}", label, context.id(), e);
                false
            }
        })
    }

    /// Queue `compile` and block until it has run.
    ///
    /// Returns `false` if the compile failed, the wait was cancelled or the
    /// arena dropped the job. Some other thread must drain the arena.
    pub fn compile_now<F>(
        &self,
        label: impl Into<String>,
        compile: F,
        cancel: Option<&CancellationToken>,
    ) -> bool
    where
        F: FnOnce(&GraphicsContext) -> GpuResult<()> + Send + 'static,
    {
        self.compile_async(label, compile)
            .get(cancel)
            .unwrap_or(false)
    }
}
