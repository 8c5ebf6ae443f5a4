use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;
use tracing_subscriber::EnvFilter;

use mediacache::{LocalStoreOptions, MediaCache, MediaCacheOptions, SharedStoreOptions, SystemClock};

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Backend {
    /// Probe Redis and fall back to the local store, as the API does.
    Auto,
    /// Skip the probe and use the local store.
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Workload {
    /// `check_and_increment` against the rate limiter.
    RateLimit,
    /// `get` on keys seeded up front.
    CacheGet,
    /// `setex` with fresh values.
    CacheSet,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyDist {
    Hot,
    Uniform,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mediacache-stress",
    about = "Load test harness for the media cache and rate limiter"
)]
struct Args {
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    backend: Backend,

    #[arg(long, value_enum, default_value_t = Workload::RateLimit)]
    workload: Workload,

    #[arg(long, value_enum, default_value_t = KeyDist::Hot)]
    key_dist: KeyDist,

    #[arg(long, default_value_t = 64)]
    tasks: usize,

    #[arg(long, default_value_t = 10)]
    duration_s: u64,

    #[arg(long, default_value_t = 10_000)]
    key_space: usize,

    #[arg(long, default_value_t = 100)]
    limit: u64,

    #[arg(long, default_value_t = 60)]
    window_s: u64,

    #[arg(long, default_value_t = 60)]
    ttl_s: u64,

    #[arg(long, default_value_t = 10_000)]
    max_local_entries: usize,

    #[arg(long, default_value_t = 100)]
    sample_every: u64,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    #[arg(long, default_value = "stress")]
    redis_prefix: String,
}

#[derive(Default)]
struct Counts {
    allowed: AtomicU64,
    rejected: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

fn build_options(args: &Args) -> MediaCacheOptions {
    MediaCacheOptions {
        local: LocalStoreOptions {
            max_entries: args.max_local_entries,
        },
        shared: SharedStoreOptions {
            enabled: args.backend == Backend::Auto,
            url: Some(args.redis_url.clone()),
            prefix: Some(
                args.redis_prefix
                    .clone()
                    .try_into()
                    .expect("--redis-prefix must be a valid key prefix"),
            ),
            ..SharedStoreOptions::default()
        },
    }
}

fn build_keys(args: &Args) -> Arc<Vec<String>> {
    let n = match args.key_dist {
        KeyDist::Hot => 1,
        KeyDist::Uniform => args.key_space.max(1),
    };
    Arc::new((0..n).map(|i| format!("stress:{i}")).collect())
}

fn should_sample(iter: u64, sample_every: u64) -> bool {
    sample_every <= 1 || iter.is_multiple_of(sample_every)
}

async fn run_one(args: &Args, mc: &MediaCache, key: &str, counts: &Counts) {
    match args.workload {
        Workload::RateLimit => {
            match mc
                .rate_limiter()
                .check_and_increment(key, args.limit, args.window_s)
                .await
            {
                Ok(true) => counts.allowed.fetch_add(1, Ordering::Relaxed),
                Ok(false) => counts.rejected.fetch_add(1, Ordering::Relaxed),
                Err(_) => counts.errors.fetch_add(1, Ordering::Relaxed),
            };
        }
        Workload::CacheGet => {
            match mc.cache().get_raw(key).await {
                Ok(Some(_)) => counts.hits.fetch_add(1, Ordering::Relaxed),
                Ok(None) => counts.misses.fetch_add(1, Ordering::Relaxed),
                Err(_) => counts.errors.fetch_add(1, Ordering::Relaxed),
            };
        }
        Workload::CacheSet => {
            if mc
                .cache()
                .setex_raw(key, args.ttl_s, b"{\"total_views\":1}".to_vec())
                .await
                .is_err()
            {
                counts.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn print_results(
    args: &Args,
    mc: &MediaCache,
    elapsed: Duration,
    ops: u64,
    hist: &Histogram<u64>,
    counts: &Counts,
) {
    println!(
        "backend={} workload={:?} key_dist={:?} key_space={}",
        mc.backend_kind(),
        args.workload,
        args.key_dist,
        args.key_space
    );
    println!(
        "tasks={} duration_s={} limit={} window_s={}",
        args.tasks, args.duration_s, args.limit, args.window_s
    );
    println!(
        "elapsed_s={:.3} ops={} ops_per_s={:.0}",
        elapsed.as_secs_f64(),
        ops,
        ops as f64 / elapsed.as_secs_f64()
    );
    println!(
        "allowed={} rejected={} hits={} misses={} errors={}",
        counts.allowed.load(Ordering::Relaxed),
        counts.rejected.load(Ordering::Relaxed),
        counts.hits.load(Ordering::Relaxed),
        counts.misses.load(Ordering::Relaxed),
        counts.errors.load(Ordering::Relaxed)
    );

    if matches!(args.workload, Workload::RateLimit) && matches!(args.key_dist, KeyDist::Hot) {
        // Every window touched during the run may admit up to `limit` requests.
        let windows = args.duration_s / args.window_s.max(1) + 2;
        println!("allowed_upper_bound={}", windows * args.limit);
    }

    if !hist.is_empty() {
        println!(
            "lat_us p50={} p95={} p99={} p999={} max={}",
            hist.value_at_quantile(0.50),
            hist.value_at_quantile(0.95),
            hist.value_at_quantile(0.99),
            hist.value_at_quantile(0.999),
            hist.max()
        );
        println!("sample_every={} samples={}", args.sample_every, hist.len());
    } else {
        println!("no latency samples collected");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mc = Arc::new(
        MediaCache::connect_with_clock(build_options(&args), Arc::new(SystemClock)).await,
    );
    let keys = build_keys(&args);

    if args.workload == Workload::CacheGet {
        for key in keys.iter() {
            mc.cache()
                .setex_raw(key, args.ttl_s, b"{\"total_views\":1}".to_vec())
                .await
                .expect("seeding the cache failed");
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let counts = Arc::new(Counts::default());
    let total_ops = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let mut handles = Vec::with_capacity(args.tasks);
    for _ in 0..args.tasks {
        let args = args.clone();
        let mc = mc.clone();
        let keys = keys.clone();
        let stop = stop.clone();
        let counts = counts.clone();
        let total_ops = total_ops.clone();

        handles.push(tokio::spawn(async move {
            let mut hist = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3).unwrap();
            let mut iter = 0_u64;

            while !stop.load(Ordering::Relaxed) {
                let key = &keys[rand::random_range(0..keys.len())];

                if should_sample(iter, args.sample_every) {
                    let t0 = Instant::now();
                    run_one(&args, &mc, key, &counts).await;
                    let us = t0.elapsed().as_micros() as u64;
                    let _ = hist.record(us.max(1));
                } else {
                    run_one(&args, &mc, key, &counts).await;
                }

                iter += 1;
            }

            total_ops.fetch_add(iter, Ordering::Relaxed);
            hist
        }));
    }

    tokio::time::sleep(Duration::from_secs(args.duration_s)).await;
    stop.store(true, Ordering::Relaxed);

    let mut merged = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3).unwrap();
    for handle in handles {
        let hist = handle.await.unwrap();
        merged.add(&hist).unwrap();
    }

    let elapsed = started.elapsed();
    print_results(
        &args,
        &mc,
        elapsed,
        total_ops.load(Ordering::Relaxed),
        &merged,
        &counts,
    );
}
