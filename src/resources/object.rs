//! Shared object state and the counted owner handle.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::context::GraphicsContext;
use crate::device::{ContextId, DeviceFeatures, GpuDevice, ObjectKind, ObjectName};
use crate::error::{GpuError, GpuResult};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a GPU object, used as the releaser's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// State common to every GPU object: the owning device, the device name,
/// the debug label and the external owner count.
pub struct ObjectHeader {
    id: ObjectId,
    kind: ObjectKind,
    device: Arc<dyn GpuDevice>,
    label: String,
    name: AtomicU32,
    owners: AtomicUsize,
}

impl ObjectHeader {
    /// Allocate a device object of `kind` on `context`.
    ///
    /// Fails with [`GpuError::AllocationFailed`] when the device returns the
    /// sentinel name.
    pub(crate) fn allocate(
        kind: ObjectKind,
        context: &GraphicsContext,
        label: impl Into<String>,
    ) -> GpuResult<Self> {
        let label = label.into();
        let device = Arc::clone(context.device());
        let name = device.gen_object(kind);
        if !name.is_valid() {
            log::warn!(
                "Failed to allocate {} '{}' on context {}",
                kind,
                label,
                context.id()
            );
            return Err(GpuError::AllocationFailed {
                kind,
                label,
                context: context.id(),
            });
        }

        Ok(Self {
            id: ObjectId::next(),
            kind,
            device,
            label,
            name: AtomicU32::new(name.0),
            owners: AtomicUsize::new(0),
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The device capability this object was created with.
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    pub fn context_id(&self) -> ContextId {
        self.device.context_id()
    }

    /// Current device name, [`ObjectName::INVALID`] once released.
    pub fn name(&self) -> ObjectName {
        ObjectName(self.name.load(Ordering::Acquire))
    }

    /// Number of live [`GpuRef`] handles to this object.
    pub fn owner_count(&self) -> usize {
        self.owners.load(Ordering::Acquire)
    }

    /// Apply the debug label if the device supports labels.
    pub(crate) fn apply_label(&self) {
        if self.device.features().contains(DeviceFeatures::DEBUG_LABELS) {
            self.device.object_label(self.kind, self.name(), &self.label);
        }
    }

    /// Invalidate the name and delete the device object if it was still valid.
    ///
    /// Only the first call issues a device call; later calls return `Ok(())`.
    pub(crate) fn delete(&self) -> GpuResult<()> {
        let name = ObjectName(self.name.swap(ObjectName::INVALID.0, Ordering::AcqRel));
        if !name.is_valid() {
            return Ok(());
        }

        log::trace!("Releasing {} {} ({})", self.kind, name, self.label);
        self.device
            .delete_object(self.kind, name)
            .map_err(|source| GpuError::DeletionFailed {
                kind: self.kind,
                name,
                label: self.label.clone(),
                source,
            })
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("label", &self.label)
            .field("context", &self.context_id())
            .field("owners", &self.owner_count())
            .finish()
    }
}

/// A device object tracked by a [`ResourceReleaser`].
///
/// [`ResourceReleaser`]: crate::releaser::ResourceReleaser
pub trait GpuObject: Send + Sync + 'static {
    fn header(&self) -> &ObjectHeader;

    /// Delete the device object.
    ///
    /// Idempotent: the first call frees the device object and invalidates the
    /// name, every later call is a no-op returning `Ok(())`. Must run on the
    /// owning context's thread.
    fn release(&self) -> GpuResult<()>;

    fn id(&self) -> ObjectId {
        self.header().id()
    }

    fn label(&self) -> &str {
        self.header().label()
    }

    fn name(&self) -> ObjectName {
        self.header().name()
    }

    fn context_id(&self) -> ContextId {
        self.header().context_id()
    }

    /// `true` from successful creation until [`release`](Self::release).
    fn is_valid(&self) -> bool {
        self.name().is_valid()
    }

    /// Number of external owners. The releaser's own reference is not counted.
    fn owner_count(&self) -> usize {
        self.header().owner_count()
    }
}

/// Counted owner handle to a GPU object.
///
/// Every clone is one external owner. When the last `GpuRef` is dropped the
/// object is not destroyed: its releaser notices the zero owner count on the
/// next sweep and releases it on the context thread.
pub struct GpuRef<T: GpuObject> {
    inner: Arc<T>,
}

impl<T: GpuObject> GpuRef<T> {
    /// Wrap a freshly created object as its first owner.
    pub(crate) fn new(object: T) -> Self {
        object.header().owners.fetch_add(1, Ordering::AcqRel);
        Self {
            inner: Arc::new(object),
        }
    }

    /// Uncounted reference for the releaser.
    pub(crate) fn tracking(&self) -> Arc<dyn GpuObject> {
        self.inner.clone()
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T: GpuObject> Clone for GpuRef<T> {
    fn clone(&self) -> Self {
        self.inner.header().owners.fetch_add(1, Ordering::AcqRel);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: GpuObject> Drop for GpuRef<T> {
    fn drop(&mut self) {
        self.inner.header().owners.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T: GpuObject> Deref for GpuRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: GpuObject + fmt::Debug> fmt::Debug for GpuRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}
