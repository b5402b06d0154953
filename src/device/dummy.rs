//! Dummy device for testing and development.
//!
//! This device performs no GPU work. It hands out increasing object names,
//! records every call it receives and can be told to fail allocations,
//! deletions or handle resolution so the failure paths of the resource layer
//! can be exercised without a graphics driver.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use super::{
    BindlessHandle, BufferTarget, ContextId, DeviceError, DeviceFeatures, GpuDevice, ObjectKind,
    ObjectName, TextureTarget,
};

/// A call received by a [`DummyDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Gen(ObjectKind, ObjectName),
    Delete(ObjectKind, ObjectName),
    BindBuffer(BufferTarget, ObjectName),
    BindBufferBase(BufferTarget, u32, ObjectName),
    BindTexture(TextureTarget, ObjectName),
    Label(ObjectKind, ObjectName, String),
    ResolveHandle(ObjectName, BindlessHandle),
    MakeResident(BindlessHandle),
    MakeNonResident(BindlessHandle),
}

#[derive(Debug, Default)]
struct DeviceState {
    calls: Vec<DeviceCall>,
    live: HashSet<(ObjectKind, ObjectName)>,
    resident: HashSet<BindlessHandle>,
}

/// Recording device with no GPU behind it.
#[derive(Debug)]
pub struct DummyDevice {
    context_id: ContextId,
    features: DeviceFeatures,
    next_name: AtomicU32,
    fail_allocations: AtomicBool,
    fail_deletions: AtomicBool,
    deny_handles: AtomicBool,
    state: Mutex<DeviceState>,
}

impl DummyDevice {
    /// Create a dummy device for `context_id` with every feature enabled.
    pub fn new(context_id: ContextId) -> Self {
        Self::with_features(context_id, DeviceFeatures::all())
    }

    /// Create a dummy device with a specific feature set.
    pub fn with_features(context_id: ContextId, features: DeviceFeatures) -> Self {
        Self {
            context_id,
            features,
            next_name: AtomicU32::new(1),
            fail_allocations: AtomicBool::new(false),
            fail_deletions: AtomicBool::new(false),
            deny_handles: AtomicBool::new(false),
            state: Mutex::new(DeviceState::default()),
        }
    }

    /// Make subsequent allocations return the sentinel name.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent deletions report an error.
    pub fn set_fail_deletions(&self, fail: bool) {
        self.fail_deletions.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent bindless handle resolution fail.
    pub fn set_deny_handles(&self, deny: bool) {
        self.deny_handles.store(deny, Ordering::Relaxed);
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Number of delete calls received, successful or not.
    pub fn delete_count(&self) -> usize {
        self.count_calls(|c| matches!(c, DeviceCall::Delete(..)))
    }

    /// Number of objects allocated and not yet deleted.
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Whether `handle` is currently resident.
    pub fn is_resident(&self, handle: BindlessHandle) -> bool {
        self.state.lock().resident.contains(&handle)
    }

    /// Forget recorded calls, keeping live objects.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: DeviceCall) {
        self.state.lock().calls.push(call);
    }
}

impl GpuDevice for DummyDevice {
    fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn features(&self) -> DeviceFeatures {
        self.features
    }

    fn gen_object(&self, kind: ObjectKind) -> ObjectName {
        let name = if self.fail_allocations.load(Ordering::Relaxed) {
            ObjectName::INVALID
        } else {
            ObjectName(self.next_name.fetch_add(1, Ordering::Relaxed))
        };

        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Gen(kind, name));
        if name.is_valid() {
            state.live.insert((kind, name));
        }
        log::trace!("DummyDevice[{}]: gen {} {}", self.context_id, kind, name);
        name
    }

    fn delete_object(&self, kind: ObjectKind, name: ObjectName) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Delete(kind, name));
        // The name is gone either way; a failing driver leaks it.
        state.live.remove(&(kind, name));

        if self.fail_deletions.load(Ordering::Relaxed) {
            return Err(DeviceError::Rejected(format!("delete {kind} {name}")));
        }
        log::trace!("DummyDevice[{}]: delete {} {}", self.context_id, kind, name);
        Ok(())
    }

    fn bind_buffer(&self, target: BufferTarget, name: ObjectName) {
        self.record(DeviceCall::BindBuffer(target, name));
    }

    fn bind_buffer_base(&self, target: BufferTarget, index: u32, name: ObjectName) {
        self.record(DeviceCall::BindBufferBase(target, index, name));
    }

    fn bind_texture(&self, target: TextureTarget, name: ObjectName) {
        self.record(DeviceCall::BindTexture(target, name));
    }

    fn object_label(&self, kind: ObjectKind, name: ObjectName, label: &str) {
        self.record(DeviceCall::Label(kind, name, label.to_string()));
    }

    fn texture_handle(&self, name: ObjectName) -> BindlessHandle {
        let handle = if self.deny_handles.load(Ordering::Relaxed)
            || !self.features.contains(DeviceFeatures::BINDLESS_TEXTURES)
        {
            BindlessHandle::INVALID
        } else {
            BindlessHandle(0x1_0000_0000 | u64::from(name.0))
        };
        self.record(DeviceCall::ResolveHandle(name, handle));
        handle
    }

    fn make_handle_resident(&self, handle: BindlessHandle) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::MakeResident(handle));
        state.resident.insert(handle);
    }

    fn make_handle_non_resident(&self, handle: BindlessHandle) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::MakeNonResident(handle));
        state.resident.remove(&handle);
    }
}

static_assertions::assert_impl_all!(DummyDevice: Send, Sync);
