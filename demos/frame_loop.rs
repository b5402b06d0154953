//! Headless frame loop demo.
//!
//! Worker threads stream buffer and texture uploads into the context's job
//! arena while the render thread runs frames on a dummy device. Each frame
//! drains the arena within its time slice and sweeps unowned objects.
//!
//! ```bash
//! cargo run --example frame_loop -- --workers 4 --jobs 200 --time-slice-ms 1
//! RUST_LOG=debug cargo run --example frame_loop
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use gpu_arena::device::dummy::DummyDevice;
use gpu_arena::{
    ArenaConfig, ArenaRegistry, BufferTarget, CancellationToken, ContextId, FrameDriver,
    GpuBuffer, GpuTexture, GraphicsContext, ReleaserRegistry, SharedFuture, TextureTarget,
};

/// Headless gpu-arena frame loop.
#[derive(Parser, Debug)]
#[command(name = "frame_loop", about = "Drive a job arena from a headless frame loop", version)]
struct Args {
    /// Number of worker threads producing GPU jobs.
    #[arg(long, default_value = "3")]
    workers: usize,

    /// Jobs dispatched by each worker.
    #[arg(long, default_value = "100")]
    jobs: usize,

    /// Arena time slice in milliseconds. Defaults to GPU_ARENA_TIME_SLICE_MS or 2.
    #[arg(long)]
    time_slice_ms: Option<u64>,

    /// Simulated cost of one job in microseconds.
    #[arg(long, default_value = "250")]
    job_cost_us: u64,

    /// Frame period in milliseconds.
    #[arg(long, default_value = "16")]
    frame_ms: u64,

    /// Stop after this many frames even if work is left.
    #[arg(long, default_value = "600")]
    max_frames: u64,
}

fn spawn_worker(
    index: usize,
    args: &Args,
    arenas: &Arc<ArenaRegistry>,
    context_id: ContextId,
    cancel: CancellationToken,
) -> std::thread::JoinHandle<usize> {
    let arena = arenas.arena_for(context_id);
    let jobs = args.jobs;
    let cost = Duration::from_micros(args.job_cost_us);

    std::thread::spawn(move || {
        let futures: Vec<SharedFuture<bool>> = (0..jobs)
            .map(|i| {
                arena.dispatch_with_result(move |ctx| {
                    std::thread::sleep(cost);
                    if i % 4 == 0 {
                        let label = format!("tile-{index}-{i}");
                        GpuTexture::create(TextureTarget::Texture2d, ctx, label)
                            .and_then(|t| t.make_resident(true))
                            .is_ok()
                    } else {
                        GpuBuffer::create(BufferTarget::Array, ctx, format!("mesh-{index}-{i}"))
                            .is_ok()
                    }
                })
            })
            .collect();

        futures
            .iter()
            .filter(|f| f.get(Some(&cancel)) == Some(true))
            .count()
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    gpu_arena::init();

    let args = Args::parse();

    let mut config = ArenaConfig::from_env();
    if let Some(ms) = args.time_slice_ms {
        config = config.with_time_slice(Duration::from_millis(ms));
    }
    log::info!("Time slice: {:?}", config.time_slice);

    let device = Arc::new(DummyDevice::new(ContextId(0)));
    let context = GraphicsContext::new(device.clone(), Arc::new(ReleaserRegistry::new()));
    let arenas = Arc::new(ArenaRegistry::new(config));
    let cancel = CancellationToken::new();

    let workers: Vec<_> = (0..args.workers)
        .map(|i| spawn_worker(i, &args, &arenas, context.id(), cancel.clone()))
        .collect();

    let arena = arenas.arena_for(context.id());
    let mut driver = FrameDriver::with_default_systems(context, &arenas);
    let frame_period = Duration::from_millis(args.frame_ms);
    let expected = args.workers * args.jobs;
    let start = Instant::now();

    while driver.frame_index() < args.max_frames {
        let frame_start = Instant::now();
        driver.frame();

        let pending = arena.pending_count();
        if driver.frame_index() % 30 == 0 {
            log::info!(
                "Frame {}: {} pending, {} live objects",
                driver.frame_index(),
                pending,
                device.live_count()
            );
        }
        if pending == 0 && workers.iter().all(|w| w.is_finished()) {
            break;
        }

        if let Some(rest) = frame_period.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    // Unblock workers still waiting on jobs that will not run anymore.
    cancel.cancel();
    let dropped = arenas.remove(driver.context().id());
    let created: usize = workers.into_iter().filter_map(|w| w.join().ok()).sum();
    let frames = driver.frame_index();
    let report = driver.teardown();

    log::info!(
        "Done after {} frames in {:?}: {}/{} jobs succeeded, {} dropped, {} released at teardown",
        frames,
        start.elapsed(),
        created,
        expected,
        dropped,
        report.released
    );
    for failure in &report.failures {
        log::warn!("Teardown: {}", failure);
    }
}
