// Warm a pre-params pool and report generation throughput.
// Usage: PARTY_INDEX=0 CONFIG_PATH=config/node.toml cargo run --bin params-pool

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use common::{init_tracing, NodeConfig};
use protocols::cggmp24::{PreParamsPool, PrimesProducer};
use tracing::{info, warn};

/// How long teardown waits for tasks still running on the runtime.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run());
    // In-flight prime searches run on detached threads and are not awaited
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run() -> Result<()> {
    let config_path = env::var("CONFIG_PATH").ok().map(PathBuf::from);
    let config = NodeConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    init_tracing(&config.logging.level, config.logging.is_json());

    let party_index: u16 = match env::var("PARTY_INDEX") {
        Ok(value) => value.parse().context("PARTY_INDEX must be a valid u16")?,
        Err(_) => 0,
    };

    info!(
        "Warming pre-params pool for party {} (capacity: {})",
        party_index, config.pool.size
    );

    let pool = PreParamsPool::new(&config.pool, PrimesProducer::new(party_index))?;
    let replenisher = pool.spawn_replenisher();
    let started = Instant::now();

    tokio::select! {
        _ = wait_until_full(&pool) => {
            info!(
                "Pool filled with {} entries in {:.2}s",
                pool.capacity(),
                started.elapsed().as_secs_f64()
            );
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted before the pool was full");
        }
    }

    replenisher.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&pool.stats())?);
    Ok(())
}

async fn wait_until_full<T: Send + 'static>(pool: &PreParamsPool<T>) {
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    while pool.len() < pool.capacity() {
        interval.tick().await;
    }
}
