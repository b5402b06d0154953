use std::sync::Arc;
use std::time::Duration;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use gpu_arena::device::dummy::DummyDevice;
use gpu_arena::{
    ArenaConfig, BufferTarget, ContextId, GpuBuffer, GraphicsContext, JobArena, Promise,
    ReleaserRegistry,
};

fn context() -> GraphicsContext {
    GraphicsContext::new(
        Arc::new(DummyDevice::new(ContextId(0))),
        Arc::new(ReleaserRegistry::new()),
    )
}

fn bound_arena(context: &GraphicsContext) -> JobArena {
    let arena = JobArena::new(
        "bench",
        ArenaConfig::default().with_time_slice(Duration::from_secs(1)),
    );
    arena.bind_context(Some(context));
    arena
}

// ---------------------------------------------------------------------------
// Job arena
// ---------------------------------------------------------------------------

fn bench_dispatch(c: &mut Criterion) {
    let context = context();
    let arena = bound_arena(&context);

    c.bench_function("arena_dispatch_noop", |b| {
        b.iter(|| arena.dispatch(|_| {}));
        arena.drain(&context).unwrap();
    });
}

fn bench_drain_1000(c: &mut Criterion) {
    let context = context();
    let arena = bound_arena(&context);

    c.bench_function("arena_drain_1000_noop_jobs", |b| {
        b.iter_batched(
            || {
                for _ in 0..1000 {
                    arena.dispatch(|_| {});
                }
            },
            |()| black_box(arena.drain(&context).unwrap()),
            BatchSize::SmallInput,
        );
    });
}

fn bench_dispatch_with_result(c: &mut Criterion) {
    let context = context();
    let arena = bound_arena(&context);

    c.bench_function("arena_dispatch_with_result_roundtrip", |b| {
        b.iter(|| {
            let future = arena.dispatch_with_result(|ctx| ctx.id().0);
            arena.drain(&context).unwrap();
            black_box(future.get(None))
        });
    });
}

// ---------------------------------------------------------------------------
// Promise
// ---------------------------------------------------------------------------

fn bench_promise_resolve_get(c: &mut Criterion) {
    c.bench_function("promise_resolve_get", |b| {
        b.iter(|| {
            let promise = Promise::new();
            let future = promise.future();
            promise.resolve(black_box(42u64)).unwrap();
            black_box(future.get(None))
        });
    });
}

// ---------------------------------------------------------------------------
// Releaser
// ---------------------------------------------------------------------------

fn bench_sweep_1000(c: &mut Criterion) {
    let context = context();

    c.bench_function("releaser_sweep_1000_half_owned", |b| {
        b.iter_batched(
            || {
                (0..1000)
                    .filter_map(|i| {
                        let buffer =
                            GpuBuffer::create(BufferTarget::Array, &context, "bench").unwrap();
                        (i % 2 == 0).then_some(buffer)
                    })
                    .collect::<Vec<_>>()
            },
            |owned| {
                black_box(context.releasers().sweep(context.id()));
                drop(owned);
                context.releasers().sweep(context.id())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_dispatch,
    bench_drain_1000,
    bench_dispatch_with_result,
    bench_promise_resolve_get,
    bench_sweep_1000,
);
criterion_main!(benches);
