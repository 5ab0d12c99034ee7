//! Ephemera Soak Binary
//!
//! Hammers a janitor-backed store from many tasks and reports counters.

use clap::Parser;
use ephemera::{Error, Store, StoreConfig, Ttl};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Ephemera Soak - concurrent load against an in-process TTL cache
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of worker tasks (0 = auto-detect based on CPU cores)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Number of distinct keys
    #[arg(long, default_value_t = 10_000)]
    keys: usize,

    /// Entry TTL in milliseconds (0 = never expire)
    #[arg(long, default_value_t = 50)]
    ttl_ms: u64,

    /// Default expiration in milliseconds for writes without an explicit TTL
    #[arg(long, default_value_t = 0)]
    default_ttl_ms: u64,

    /// Janitor interval in milliseconds (0 = no janitor)
    #[arg(long, default_value_t = 10)]
    cleanup_ms: u64,

    /// Run duration in seconds
    #[arg(short, long, default_value_t = 5)]
    duration: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ephemera=info".parse()?))
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.keys > 0, "--keys must be positive");

    let workers = if args.workers == 0 {
        num_cpus::get()
    } else {
        args.workers
    };

    let config = StoreConfig::default()
        .with_default_expiration(Duration::from_millis(args.default_ttl_ms))
        .with_cleanup_interval(Duration::from_millis(args.cleanup_ms));
    let store: Arc<Store<u64>> = Arc::new(Store::with_config(config)?);

    info!(
        "Starting soak with {} workers over {} keys for {}s (ttl={}ms, cleanup={}ms)",
        workers, args.keys, args.duration, args.ttl_ms, args.cleanup_ms
    );

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let ttl = if args.ttl_ms == 0 {
        Ttl::Default
    } else {
        Ttl::After(Duration::from_millis(args.ttl_ms))
    };

    let mut tasks = Vec::with_capacity(workers);
    for worker in 0..workers {
        let store = Arc::clone(&store);
        let keys = args.keys;
        tasks.push(tokio::spawn(async move {
            let mut op: u64 = 0;
            while Instant::now() < deadline {
                let slot = (worker as u64)
                    .wrapping_mul(7919)
                    .wrapping_add(op.wrapping_mul(104_729))
                    % keys as u64;
                let key = format!("soak:{}", slot);

                match op % 4 {
                    0 => store.put(key, op, ttl)?,
                    1 | 2 => match store.get(&key) {
                        Ok(_) => {}
                        Err(e) if e.is_miss() => {}
                        Err(e) => return Err(e),
                    },
                    _ => match store.delete(&key) {
                        Ok(()) | Err(Error::KeyNotFound) => {}
                        Err(e) => return Err(e),
                    },
                }

                op += 1;
                if op % 1024 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            Ok::<u64, Error>(op)
        }));
    }

    let mut total_ops = 0u64;
    for task in tasks {
        match task.await? {
            Ok(ops) => total_ops += ops,
            Err(e) => warn!(error = %e, "Worker failed"),
        }
    }

    let visible = store.items().len();
    let stored = store.len();
    info!("Completed {} operations", total_ops);
    info!("{}", store.stats().summary());
    info!(
        "Entries: {} stored, {} visible, {} awaiting sweep",
        stored,
        visible,
        stored.saturating_sub(visible)
    );

    if let Some(janitor) = store.janitor() {
        janitor.stop();
    }

    Ok(())
}
