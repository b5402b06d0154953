//! Single-assignment result cell shared between threads.
//!
//! A [`Promise`] is the producing side: typically a job running on a
//! context thread. Every [`SharedFuture`] obtained from it observes the same
//! value once the promise is resolved.
//!
//! # Policies
//!
//! - Resolving twice is rejected with [`GpuError::AlreadyResolved`]; the
//!   first value stays.
//! - Dropping an unresolved promise abandons it: waiters wake up and get
//!   `None` instead of blocking forever.
//! - Cancelling a wait only affects that waiter. The producer keeps
//!   running and may still resolve; the value is then simply unconsumed.
//!
//! # Example
//!
//! ```ignore
//! let promise = Promise::new();
//! let future = promise.future();
//!
//! arena.dispatch(move |ctx| {
//!     let texture = GpuTexture::create(TextureTarget::Texture2d, ctx, "atlas");
//!     let _ = promise.resolve(texture.is_ok());
//! });
//!
//! // Any thread:
//! let created = future.get(Some(&cancel));
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cancel::CancellationToken;
use crate::error::{GpuError, GpuResult};

/// How often a cancellable wait re-checks its token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Resolved,
    Abandoned,
}

struct State<T> {
    status: Status,
    value: Option<T>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    futures: AtomicUsize,
    issued: AtomicBool,
}

impl<T> Shared<T> {
    fn finish(&self, status: Status, value: Option<T>) -> bool {
        let wakers = {
            let mut state = self.state.lock();
            if state.status != Status::Pending {
                return false;
            }
            state.status = status;
            state.value = value;
            std::mem::take(&mut state.wakers)
        };

        self.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

/// Producing side of a single-assignment result.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    status: Status::Pending,
                    value: None,
                    wakers: Vec::new(),
                }),
                ready: Condvar::new(),
                futures: AtomicUsize::new(0),
                issued: AtomicBool::new(false),
            }),
        }
    }

    /// A future observing this promise. Can be called any number of times.
    pub fn future(&self) -> SharedFuture<T> {
        self.shared.issued.store(true, Ordering::Release);
        SharedFuture::attach(Arc::clone(&self.shared))
    }

    /// Set the result and wake every waiter.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::AlreadyResolved`] if the promise was already
    /// resolved; the new value is dropped.
    pub fn resolve(&self, value: T) -> GpuResult<()> {
        if self.shared.finish(Status::Resolved, Some(value)) {
            Ok(())
        } else {
            log::debug!("Promise resolved twice, keeping the first value");
            Err(GpuError::AlreadyResolved)
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.state.lock().status == Status::Resolved
    }

    /// `true` once futures were handed out and all of them have been dropped.
    ///
    /// Producers can check this to skip work nobody waits for anymore.
    pub fn is_abandoned(&self) -> bool {
        self.shared.issued.load(Ordering::Acquire)
            && self.shared.futures.load(Ordering::Acquire) == 0
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.shared.finish(Status::Abandoned, None);
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("status", &self.shared.state.lock().status)
            .field("futures", &self.shared.futures.load(Ordering::Relaxed))
            .finish()
    }
}

/// Consuming side of a [`Promise`].
///
/// Clones observe the same value. Blocking waits take an optional
/// [`CancellationToken`]; a cancelled wait returns `None` without affecting
/// the producer. The type also implements [`std::future::Future`] for
/// callers that run an async executor.
pub struct SharedFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SharedFuture<T> {
    fn attach(shared: Arc<Shared<T>>) -> Self {
        shared.futures.fetch_add(1, Ordering::AcqRel);
        Self { shared }
    }

    /// A future that is already resolved with `value`.
    pub fn ready(value: T) -> Self {
        let promise = Promise::new();
        let future = promise.future();
        // A fresh promise cannot be resolved already.
        let _ = promise.resolve(value);
        future
    }

    /// Whether the value is available.
    pub fn is_available(&self) -> bool {
        self.shared.state.lock().status == Status::Resolved
    }

    /// Whether the promise was dropped without a value.
    pub fn is_abandoned(&self) -> bool {
        self.shared.state.lock().status == Status::Abandoned
    }

    /// Wait for completion and discard the value.
    ///
    /// Returns `true` if the promise resolved, `false` if the wait was
    /// cancelled or the promise was abandoned.
    pub fn join(&self, cancel: Option<&CancellationToken>) -> bool {
        let mut state = self.shared.state.lock();
        loop {
            match state.status {
                Status::Resolved => return true,
                Status::Abandoned => return false,
                Status::Pending => {}
            }
            match cancel {
                Some(token) if token.is_cancelled() => return false,
                Some(_) => {
                    self.shared.ready.wait_for(&mut state, CANCEL_POLL_INTERVAL);
                }
                None => self.shared.ready.wait(&mut state),
            }
        }
    }
}

impl<T: Clone> SharedFuture<T> {
    /// The value if it is already available.
    pub fn try_get(&self) -> Option<T> {
        self.shared.state.lock().value.clone()
    }

    /// Block until the value is available.
    ///
    /// Returns `None` if `cancel` fires first or the promise is abandoned.
    pub fn get(&self, cancel: Option<&CancellationToken>) -> Option<T> {
        if self.join(cancel) {
            self.try_get()
        } else {
            None
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.status == Status::Pending {
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.value.clone()
    }
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self::attach(Arc::clone(&self.shared))
    }
}

impl<T> Drop for SharedFuture<T> {
    fn drop(&mut self) {
        self.shared.futures.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T: Clone> std::future::Future for SharedFuture<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut state = self.shared.state.lock();
        match state.status {
            Status::Resolved => Poll::Ready(state.value.clone()),
            Status::Abandoned => Poll::Ready(None),
            Status::Pending => {
                if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    state.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for SharedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFuture")
            .field("status", &self.shared.state.lock().status)
            .finish()
    }
}

static_assertions::assert_impl_all!(Promise<u32>: Send, Sync);
static_assertions::assert_impl_all!(SharedFuture<u32>: Send, Sync);
