//! Deferred, owner-count-gated release of GPU objects.
//!
//! GPU objects may only be deleted on the thread that owns their context,
//! but their owners live on any thread and drop them whenever they like.
//! Instead of deleting in `Drop`, every object registers with the releaser
//! of its context and the releaser deletes it later, on the context thread.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ReleaserRegistry                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Context 0    │  │ Context 1    │  │ Context 2    │  ...  │
//! │  │ tracked objs │  │ tracked objs │  │ tracked objs │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//!
//! On create(Object):
//!   1. Allocate the device name
//!   2. Insert an uncounted reference into the context's releaser
//!
//! Once per frame, on the context thread (sweep):
//!   1. Take every object whose owner count is zero out of the set
//!   2. Release them outside the lock
//!
//! On context teardown (release_all):
//!   1. Release every tracked object regardless of owners
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::device::ContextId;
use crate::error::GpuError;
use crate::resources::{GpuObject, ObjectId};

/// Outcome of a sweep or a forced release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Objects released and dropped from tracking.
    pub released: usize,
    /// Objects still owned elsewhere and kept for the next sweep.
    pub retained: usize,
    /// Device deletions that failed. Those objects are untracked regardless.
    pub failures: Vec<GpuError>,
}

impl SweepReport {
    /// `true` if every release succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tracks the GPU objects of one context and releases them on its thread.
pub struct ResourceReleaser {
    context_id: ContextId,
    objects: Mutex<HashMap<ObjectId, Arc<dyn GpuObject>>>,
}

impl ResourceReleaser {
    pub fn new(context_id: ContextId) -> Self {
        Self {
            context_id,
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Start tracking `object`.
    ///
    /// Returns `false` without tracking if the object belongs to another
    /// context or has no valid device name.
    pub fn watch(&self, object: Arc<dyn GpuObject>) -> bool {
        if object.context_id() != self.context_id {
            log::warn!(
                "ResourceReleaser[{}]: refusing '{}' from context {}",
                self.context_id,
                object.label(),
                object.context_id()
            );
            return false;
        }
        if !object.is_valid() {
            return false;
        }

        self.objects.lock().insert(object.id(), object);
        true
    }

    /// Number of objects currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_tracking(&self, id: ObjectId) -> bool {
        self.objects.lock().contains_key(&id)
    }

    /// Release every object that has no owner left.
    ///
    /// Objects with owners are kept for the next sweep. Must run on the
    /// context thread. The lock is only held while partitioning the set,
    /// never during device calls.
    pub fn sweep(&self) -> SweepReport {
        let mut reclaim = Vec::new();
        let retained = {
            let mut objects = self.objects.lock();
            objects.retain(|_, object| {
                if object.owner_count() == 0 {
                    reclaim.push(Arc::clone(object));
                    false
                } else {
                    true
                }
            });
            objects.len()
        };

        let report = self.release_each(reclaim, retained);
        if report.released > 0 {
            log::debug!(
                "ResourceReleaser[{}]: swept {} objects, {} retained",
                self.context_id,
                report.released,
                report.retained
            );
        }
        report
    }

    /// Release and untrack every object regardless of owners.
    ///
    /// Used at context teardown. Must run on the context thread before the
    /// device capability becomes invalid.
    pub fn release_all(&self) -> SweepReport {
        let objects: Vec<_> = self.objects.lock().drain().map(|(_, o)| o).collect();
        log::debug!(
            "ResourceReleaser[{}]: releasing all {} objects",
            self.context_id,
            objects.len()
        );
        self.release_each(objects, 0)
    }

    /// Untrack every object without touching the device.
    ///
    /// For contexts that are already gone; returns the number discarded.
    pub fn discard_all(&self) -> usize {
        let count = {
            let mut objects = self.objects.lock();
            let count = objects.len();
            objects.clear();
            count
        };
        if count > 0 {
            log::debug!(
                "ResourceReleaser[{}]: discarded {} objects",
                self.context_id,
                count
            );
        }
        count
    }

    fn release_each(&self, objects: Vec<Arc<dyn GpuObject>>, retained: usize) -> SweepReport {
        let mut report = SweepReport {
            released: 0,
            retained,
            failures: Vec::new(),
        };

        for object in objects {
            report.released += 1;
            if let Err(e) = object.release() {
                log::warn!("ResourceReleaser[{}]: {}", self.context_id, e);
                report.failures.push(e);
            }
        }
        report
    }
}

impl fmt::Debug for ResourceReleaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceReleaser")
            .field("context_id", &self.context_id)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

/// One [`ResourceReleaser`] per context, created on first use.
#[derive(Default)]
pub struct ReleaserRegistry {
    releasers: RwLock<HashMap<ContextId, Arc<ResourceReleaser>>>,
}

impl ReleaserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The releaser for `context_id`, if one was created.
    pub fn releaser(&self, context_id: ContextId) -> Option<Arc<ResourceReleaser>> {
        self.releasers.read().get(&context_id).cloned()
    }

    /// The releaser for `context_id`, creating it if absent.
    pub fn get_or_create(&self, context_id: ContextId) -> Arc<ResourceReleaser> {
        if let Some(releaser) = self.releaser(context_id) {
            return releaser;
        }

        let mut releasers = self.releasers.write();
        Arc::clone(releasers.entry(context_id).or_insert_with(|| {
            log::debug!("Creating ResourceReleaser for context {}", context_id);
            Arc::new(ResourceReleaser::new(context_id))
        }))
    }

    /// Track `object` with the releaser of its own context.
    ///
    /// No-op for objects without a valid device name.
    pub fn watch(&self, object: Arc<dyn GpuObject>) {
        if !object.is_valid() {
            return;
        }
        self.get_or_create(object.context_id()).watch(object);
    }

    /// Sweep the releaser of `context_id`. Context thread only.
    pub fn sweep(&self, context_id: ContextId) -> SweepReport {
        self.releaser(context_id)
            .map(|r| r.sweep())
            .unwrap_or_default()
    }

    /// Force-release everything tracked for `context_id`. Context thread only.
    pub fn release_all(&self, context_id: ContextId) -> SweepReport {
        self.releaser(context_id)
            .map(|r| r.release_all())
            .unwrap_or_default()
    }

    /// Drop tracking for `context_id` without device calls.
    pub fn discard_all(&self, context_id: ContextId) -> usize {
        self.releaser(context_id)
            .map(|r| r.discard_all())
            .unwrap_or(0)
    }

    /// Number of objects tracked for `context_id`.
    pub fn tracked_count(&self, context_id: ContextId) -> usize {
        self.releaser(context_id)
            .map(|r| r.tracked_count())
            .unwrap_or(0)
    }

    /// Contexts that have a releaser, in ascending order.
    pub fn context_ids(&self) -> Vec<ContextId> {
        let mut ids: Vec<_> = self.releasers.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ReleaserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaserRegistry")
            .field("contexts", &self.context_ids())
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourceReleaser: Send, Sync);
static_assertions::assert_impl_all!(ReleaserRegistry: Send, Sync);
