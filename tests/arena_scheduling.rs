//! Integration tests for job arenas, frame drivers and promises.
//!
//! These run worker threads against a render thread the way an application
//! would, with the dummy device standing in for the graphics API.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rstest::rstest;

use common::{TestContext, arena, busy_wait};
use gpu_arena::{
    ArenaRegistry, BufferTarget, CancellationToken, ContextId, FrameDriver, GpuBuffer, GpuObject,
    ObjectsCompiler, Promise, TextureTarget,
};

// ============================================================================
// Time slicing
// ============================================================================

/// 10 jobs of about 1 ms against a 5 ms slice: about 5 run, the rest wait.
#[test]
fn test_drain_respects_time_slice() {
    common::init_logging();
    let ctx = TestContext::new(0);
    let arena = arena("slice", 5);
    arena.bind_context(Some(&ctx.context));

    for _ in 0..10 {
        arena.dispatch(|_| busy_wait(Duration::from_millis(1)));
    }

    let stats = arena.drain(&ctx.context).unwrap();
    // Each job takes at least 1 ms, so the sixth never starts.
    assert!((4..=5).contains(&stats.executed), "executed {}", stats.executed);
    assert_eq!(stats.executed + stats.remaining, 10);
    assert!(stats.elapsed >= Duration::from_millis(stats.executed as u64));
}

/// Negligible jobs with a generous slice: everything runs in one drain.
#[rstest]
#[case::empty(0)]
#[case::single(1)]
#[case::ten(10)]
#[case::thousand(1000)]
fn test_drain_empties_queue_of_cheap_jobs(#[case] jobs: usize) {
    let ctx = TestContext::new(0);
    let arena = arena("cheap", 1000);
    arena.bind_context(Some(&ctx.context));

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..jobs {
        let counter = counter.clone();
        arena.dispatch(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    let stats = arena.drain(&ctx.context).unwrap();
    assert_eq!(stats.executed, jobs);
    assert_eq!(stats.remaining, 0);
    assert_eq!(counter.load(Ordering::Relaxed), jobs);
}

/// A single long job overruns the slice but still runs, alone.
#[rstest]
#[case::one_ms(1)]
#[case::two_ms(2)]
fn test_long_job_runs_alone(#[case] slice_ms: u64) {
    let ctx = TestContext::new(0);
    let arena = arena("long", slice_ms);
    arena.bind_context(Some(&ctx.context));

    arena.dispatch(move |_| busy_wait(Duration::from_millis(slice_ms * 3)));
    arena.dispatch(|_| {});

    let stats = arena.drain(&ctx.context).unwrap();
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.remaining, 1);
}

// ============================================================================
// Ordering
// ============================================================================

/// Several producers: each producer's jobs run in the order it dispatched them.
#[test]
fn test_per_producer_fifo() {
    const PRODUCERS: usize = 4;
    const JOBS: usize = 200;

    let ctx = TestContext::new(0);
    let arena = arena("fifo", 1000);
    arena.bind_context(Some(&ctx.context));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let arena = arena.clone();
            let seen = seen.clone();
            std::thread::spawn(move || {
                for seq in 0..JOBS {
                    let seen = seen.clone();
                    arena.dispatch(move |_| seen.lock().push((producer, seq)));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    arena.drain(&ctx.context).unwrap();
    let seen = seen.lock();
    assert_eq!(seen.len(), PRODUCERS * JOBS);
    for producer in 0..PRODUCERS {
        let order: Vec<_> = seen
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(order, (0..JOBS).collect::<Vec<_>>());
    }
}

// ============================================================================
// Binding
// ============================================================================

/// After rebinding, jobs only ever see the new context.
#[test]
fn test_rebind_never_drains_old_context() {
    let first = TestContext::new(1);
    let second = TestContext::new(2);
    let arena = arena("rebind", 1000);

    let seen = Arc::new(Mutex::new(Vec::new()));
    arena.bind_context(Some(&first.context));
    {
        let seen = seen.clone();
        arena.dispatch(move |ctx| seen.lock().push(ctx.id()));
    }
    arena.drain(&first.context).unwrap();

    arena.bind_context(Some(&second.context));
    for _ in 0..3 {
        let seen = seen.clone();
        arena.dispatch(move |ctx| seen.lock().push(ctx.id()));
    }
    assert!(arena.drain(&first.context).is_err());
    assert_eq!(arena.pending_count(), 3);
    arena.drain(&second.context).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![ContextId(1), ContextId(2), ContextId(2), ContextId(2)]
    );
}

// ============================================================================
// Promises
// ============================================================================

/// A cancelled wait yields nothing, and the job still resolves later.
#[test]
fn test_cancelled_wait_then_resolve() {
    let ctx = TestContext::new(0);
    let arena = arena("cancel", 1000);
    arena.bind_context(Some(&ctx.context));

    let future = arena.dispatch_with_result(|ctx| {
        GpuBuffer::create(BufferTarget::Array, ctx, "late").map(|b| b.name())
    });

    let cancel = CancellationToken::new();
    let waiter = {
        let future = future.clone();
        let cancel = cancel.clone();
        std::thread::spawn(move || future.get(Some(&cancel)))
    };
    cancel.cancel();
    assert_eq!(waiter.join().unwrap(), None);

    arena.drain(&ctx.context).unwrap();
    let name = future.try_get().unwrap().unwrap();
    assert!(name.is_valid());
}

/// Every waiter, before or after resolution, sees the one value.
#[test]
fn test_promise_value_observed_by_all_waiters() {
    let promise = Promise::new();
    let early: Vec<_> = (0..4)
        .map(|_| {
            let future = promise.future();
            std::thread::spawn(move || future.get(None))
        })
        .collect();

    promise.resolve(17u32).unwrap();
    assert!(promise.resolve(18).is_err());

    for waiter in early {
        assert_eq!(waiter.join().unwrap(), Some(17));
    }
    let late = promise.future();
    assert_eq!(late.get(None), Some(17));
    assert!(late.join(None));
}

// ============================================================================
// Frame loop
// ============================================================================

/// Workers feed the arena while a render thread runs frames; every job runs
/// on the render thread and nothing leaks after teardown.
#[test]
fn test_frame_loop_with_workers() {
    common::init_logging();
    const WORKERS: usize = 3;
    const BUFFERS_PER_WORKER: usize = 20;

    let ctx = TestContext::new(7);
    let arenas = Arc::new(ArenaRegistry::default());
    arenas
        .arena_for(ctx.id())
        .set_time_slice(Duration::from_millis(1));

    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let arena = arenas.arena_for(ctx.id());
            std::thread::spawn(move || {
                let futures: Vec<_> = (0..BUFFERS_PER_WORKER)
                    .map(|i| {
                        arena.dispatch_with_result(move |ctx| {
                            GpuBuffer::create(BufferTarget::Array, ctx, format!("w{w}-{i}"))
                                .is_ok()
                        })
                    })
                    .collect();
                futures.iter().filter(|f| f.get(None) == Some(true)).count()
            })
        })
        .collect();

    let render = {
        let context = ctx.context.clone();
        let device = ctx.device.clone();
        let arenas = arenas.clone();
        std::thread::spawn(move || {
            let mut driver = FrameDriver::with_default_systems(context, &arenas);
            // Every buffer is dropped right after creation, so the sweep
            // deletes them all once every job has run.
            while device.delete_count() < WORKERS * BUFFERS_PER_WORKER
                && driver.frame_index() < 20_000
            {
                driver.frame();
                std::thread::sleep(Duration::from_micros(200));
            }
            driver.teardown()
        })
    };

    let created: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    let report = render.join().unwrap();

    assert_eq!(created, WORKERS * BUFFERS_PER_WORKER);
    assert!(report.is_clean());
    assert_eq!(ctx.device.live_count(), 0);
    assert_eq!(ctx.device.delete_count(), WORKERS * BUFFERS_PER_WORKER);
}

/// Fan a compile out to every context and wait for all of them.
#[test]
fn test_compile_on_all_contexts() {
    let contexts: Vec<_> = (1..=3).map(TestContext::new).collect();
    let arenas = ArenaRegistry::default();
    for ctx in &contexts {
        arenas.arena_for(ctx.id()).bind_context(Some(&ctx.context));
    }

    let futures = arenas.dispatch_on_all_contexts(|ctx| {
        GpuBuffer::create(BufferTarget::Uniform, ctx, "camera").is_ok()
    });
    let compiler = ObjectsCompiler::new(arenas.arena_for(ContextId(2)));
    let texture = compiler.compile_async("lut", |ctx| {
        gpu_arena::GpuTexture::create(TextureTarget::Texture3d, ctx, "lut").map(|_| ())
    });

    for ctx in &contexts {
        arenas.arena_for(ctx.id()).drain(&ctx.context).unwrap();
    }

    assert!(futures.iter().all(|f| f.get(None) == Some(true)));
    assert_eq!(texture.get(None), Some(true));
    assert_eq!(contexts[0].device.live_count(), 1);
    assert_eq!(contexts[1].device.live_count(), 2);
    assert_eq!(contexts[2].device.live_count(), 1);
}
