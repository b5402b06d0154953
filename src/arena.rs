//! Time-sliced job queue drained on a graphics context thread.
//!
//! Any thread can [`dispatch`](JobArena::dispatch) a closure. The thread
//! owning the bound context calls [`drain`](JobArena::drain) once per frame
//! (usually through [`ArenaConnector`](crate::frame::ArenaConnector)), which
//! runs queued closures in FIFO order until the queue is empty or the time
//! slice is used up.
//!
//! ```text
//! ┌──────────────┐  dispatch   ┌────────────────────┐  drain (≤ slice)  ┌────────────────┐
//! │ worker thread│ ──────────► │ JobArena queue     │ ────────────────► │ context thread │
//! └──────────────┘             │ Mutex<VecDeque<..>>│                   │ job(&context)  │
//!                              └────────────────────┘                   └────────────────┘
//! ```
//!
//! The slice is checked between jobs only. A drain of a non-empty queue
//! always runs at least one job, and a long job can still overrun the frame.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::config::ArenaConfig;
use crate::context::GraphicsContext;
use crate::device::ContextId;
use crate::error::{GpuError, GpuResult};
use crate::promise::{Promise, SharedFuture};

/// Type-erased job executed on the context thread.
pub type ArenaJob = Box<dyn FnOnce(&GraphicsContext) + Send>;

/// Outcome of one [`JobArena::drain`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Jobs executed during this drain.
    pub executed: usize,
    /// Jobs still queued when the drain returned.
    pub remaining: usize,
    /// Wall-clock time spent in the drain.
    pub elapsed: Duration,
}

/// FIFO queue of GPU jobs bound to at most one graphics context.
pub struct JobArena {
    name: String,
    binding: RwLock<Option<GraphicsContext>>,
    queue: Mutex<VecDeque<ArenaJob>>,
    time_slice: Mutex<Duration>,
    done: AtomicBool,
}

impl JobArena {
    pub fn new(name: impl Into<String>, config: ArenaConfig) -> Self {
        Self {
            name: name.into(),
            binding: RwLock::new(None),
            queue: Mutex::new(VecDeque::new()),
            time_slice: Mutex::new(config.time_slice),
            done: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job. Never blocks beyond the queue lock.
    ///
    /// Jobs dispatched after [`shutdown`](Self::shutdown) are dropped.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce(&GraphicsContext) + Send + 'static,
    {
        // The flag is checked under the queue lock so a concurrent shutdown
        // cannot miss the job.
        let mut queue = self.queue.lock();
        if self.is_shut_down() {
            drop(queue);
            log::warn!("JobArena '{}' is shut down, dropping job", self.name);
            return;
        }
        queue.push_back(Box::new(job));
    }

    /// Queue a job and get a future for its return value.
    ///
    /// The future is abandoned if the job is dropped without running, for
    /// example by [`shutdown`](Self::shutdown).
    pub fn dispatch_with_result<T, F>(&self, job: F) -> SharedFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&GraphicsContext) -> T + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.future();
        self.dispatch(move |context| {
            if promise.resolve(job(context)).is_err() {
                log::warn!("Arena job result was already resolved");
            }
        });
        future
    }

    /// Run queued jobs on the calling thread, which must own `context`.
    ///
    /// Stops when the queue is empty, the time slice has elapsed (checked
    /// after each job), or the arena was rebound to another context by a
    /// job. At least one job runs if any were queued.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::StaleContextBinding`] without running anything
    /// if the arena is not bound to `context`.
    pub fn drain(&self, context: &GraphicsContext) -> GpuResult<DrainStats> {
        if self.is_shut_down() {
            return Ok(DrainStats::default());
        }

        let bound = self.bound_context_id();
        if bound != Some(context.id()) {
            return Err(GpuError::StaleContextBinding {
                arena: self.name.clone(),
                bound,
                requested: context.id(),
            });
        }

        let slice = self.time_slice();
        let start = Instant::now();
        let mut executed = 0;

        loop {
            // Pop under the lock, run outside it so jobs can dispatch more work.
            let Some(job) = self.queue.lock().pop_front() else {
                break;
            };
            job(context);
            executed += 1;

            if start.elapsed() >= slice || self.is_shut_down() {
                break;
            }
            if self.bound_context_id() != Some(context.id()) {
                log::debug!(
                    "JobArena '{}' rebound during drain, stopping on context {}",
                    self.name,
                    context.id()
                );
                break;
            }
        }

        let stats = DrainStats {
            executed,
            remaining: self.pending_count(),
            elapsed: start.elapsed(),
        };
        if executed > 0 {
            log::trace!(
                "JobArena '{}' ran {} job(s) in {:?}, {} pending",
                self.name,
                stats.executed,
                stats.elapsed,
                stats.remaining
            );
        }
        Ok(stats)
    }

    /// Bind the arena to `context`, or unbind it with `None`.
    ///
    /// Binding the current context again does nothing. Binding a different
    /// context detaches from the old one first.
    pub fn bind_context(&self, context: Option<&GraphicsContext>) {
        let mut binding = self.binding.write();
        let current = binding.as_ref().map(GraphicsContext::id);
        if current == context.map(GraphicsContext::id) {
            return;
        }

        if let Some(old) = binding.take() {
            log::info!("JobArena '{}' detached from context {}", self.name, old.id());
        }
        if let Some(context) = context {
            *binding = Some(context.clone());
            log::info!("JobArena '{}' attached to context {}", self.name, context.id());
        }
    }

    /// Bind to `context` only if no context is bound yet.
    ///
    /// Returns `true` if the arena is bound to `context` afterwards.
    pub fn bind_if_unbound(&self, context: &GraphicsContext) -> bool {
        let mut binding = self.binding.write();
        match binding.as_ref() {
            Some(bound) => bound.id() == context.id(),
            None => {
                *binding = Some(context.clone());
                log::info!("JobArena '{}' attached to context {}", self.name, context.id());
                true
            }
        }
    }

    pub fn bound_context_id(&self) -> Option<ContextId> {
        self.binding.read().as_ref().map(GraphicsContext::id)
    }

    pub fn set_time_slice(&self, time_slice: Duration) {
        *self.time_slice.lock() = time_slice;
    }

    pub fn time_slice(&self) -> Duration {
        *self.time_slice.lock()
    }

    /// Number of queued jobs.
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Stop the arena: drop queued jobs and make later drains no-ops.
    ///
    /// Returns how many queued jobs were dropped.
    pub fn shutdown(&self) -> usize {
        let dropped: Vec<ArenaJob> = {
            let mut queue = self.queue.lock();
            self.done.store(true, Ordering::Release);
            queue.drain(..).collect()
        };
        let count = dropped.len();
        // Dropping jobs may drop promises, which wakes waiters. Do it unlocked.
        drop(dropped);
        self.bind_context(None);
        if count > 0 {
            log::debug!("JobArena '{}' shut down, dropped {} job(s)", self.name, count);
        }
        count
    }

    pub fn is_shut_down(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl fmt::Debug for JobArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobArena")
            .field("name", &self.name)
            .field("bound", &self.bound_context_id())
            .field("pending", &self.pending_count())
            .field("time_slice", &self.time_slice())
            .field("done", &self.is_shut_down())
            .finish()
    }
}

/// Arenas keyed by context, plus a process default arena.
///
/// Owned by whoever manages context lifetimes and handed to collaborators
/// by reference.
pub struct ArenaRegistry {
    config: ArenaConfig,
    default: Arc<JobArena>,
    arenas: RwLock<HashMap<ContextId, Arc<JobArena>>>,
}

impl ArenaRegistry {
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            default: Arc::new(JobArena::new("default", config)),
            arenas: RwLock::new(HashMap::new()),
        }
    }

    /// Registry configured from the process environment.
    pub fn from_env() -> Self {
        Self::new(ArenaConfig::from_env())
    }

    pub fn config(&self) -> ArenaConfig {
        self.config
    }

    /// The arena not tied to a particular context id.
    pub fn default_arena(&self) -> &Arc<JobArena> {
        &self.default
    }

    /// The arena for `context_id`, created on first use.
    ///
    /// An arena that was shut down is replaced by a fresh one.
    pub fn arena_for(&self, context_id: ContextId) -> Arc<JobArena> {
        if let Some(arena) = self.arenas.read().get(&context_id)
            && !arena.is_shut_down()
        {
            return Arc::clone(arena);
        }

        let mut arenas = self.arenas.write();
        let arena = arenas
            .entry(context_id)
            .and_modify(|arena| {
                if arena.is_shut_down() {
                    log::debug!("Replacing shut down job arena for context {}", context_id);
                    *arena = Arc::new(JobArena::new(arena.name(), self.config));
                }
            })
            .or_insert_with(|| {
                log::debug!("Creating job arena for context {}", context_id);
                Arc::new(JobArena::new(format!("context-{}", context_id), self.config))
            });
        Arc::clone(arena)
    }

    pub fn arena(&self, context_id: ContextId) -> Option<Arc<JobArena>> {
        self.arenas.read().get(&context_id).cloned()
    }

    /// Ids of all contexts with an arena, sorted.
    pub fn context_ids(&self) -> Vec<ContextId> {
        let mut ids: Vec<_> = self.arenas.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Shut down and forget the arena of `context_id`.
    ///
    /// Returns the number of queued jobs that were dropped.
    pub fn remove(&self, context_id: ContextId) -> usize {
        let arena = self.arenas.write().remove(&context_id);
        arena.map_or(0, |arena| arena.shutdown())
    }

    /// Dispatch `job` to every per-context arena.
    ///
    /// Returns one future per context, in [`context_ids`](Self::context_ids)
    /// order. Waiting for all of them is up to the caller.
    pub fn dispatch_on_all_contexts<T, F>(&self, job: F) -> Vec<SharedFuture<T>>
    where
        T: Send + 'static,
        F: Fn(&GraphicsContext) -> T + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        self.context_ids()
            .into_iter()
            .map(|id| {
                let job = Arc::clone(&job);
                self.arena_for(id).dispatch_with_result(move |context| job(context))
            })
            .collect()
    }
}

impl Default for ArenaRegistry {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl fmt::Debug for ArenaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaRegistry")
            .field("config", &self.config)
            .field("contexts", &self.context_ids())
            .finish()
    }
}

static_assertions::assert_impl_all!(JobArena: Send, Sync);
static_assertions::assert_impl_all!(ArenaRegistry: Send, Sync);
