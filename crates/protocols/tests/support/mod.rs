//! Shared fixtures for pre-params pool tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::PoolConfig;
use protocols::cggmp24::{ParamsProducer, PreParamsPool, ProducerError};
use tokio_util::sync::CancellationToken;

/// Pool config with short retry delays so failure tests run quickly.
pub fn fast_config(size: usize) -> PoolConfig {
    PoolConfig {
        size,
        retry_initial_backoff_ms: 1,
        retry_max_backoff_ms: 5,
    }
}

/// Producer handing out sequential ids after `delay`; returns the call counter.
pub fn counting_producer(
    delay: Duration,
) -> (
    impl Fn() -> Result<u64, ProducerError> + Send + Sync + 'static,
    Arc<AtomicU64>,
) {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);

    let producer = move || {
        std::thread::sleep(delay);
        Ok(counter.fetch_add(1, Ordering::SeqCst))
    };

    (producer, calls)
}

/// Producer failing its first `failures` calls, then behaving like `counting_producer`.
pub fn flaky_producer(
    failures: u64,
) -> (
    impl Fn() -> Result<u64, ProducerError> + Send + Sync + 'static,
    Arc<AtomicU64>,
) {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);

    let producer = move || {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        if call < failures {
            Err(ProducerError::new(format!("transient failure #{}", call)))
        } else {
            Ok(call)
        }
    };

    (producer, calls)
}

/// Producer that runs until the replenisher shuts down, like a prime search
/// checking for cancellation between candidates.
pub struct InterruptibleProducer {
    pub started: Arc<AtomicBool>,
    pub cancelled: Arc<AtomicBool>,
}

impl InterruptibleProducer {
    pub fn new() -> Self {
        Self {
            started: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ParamsProducer for InterruptibleProducer {
    type Output = u64;

    fn produce(&self) -> Result<u64, ProducerError> {
        Err(ProducerError::new("only runs under a replenisher"))
    }

    fn produce_cancellable(&self, shutdown: &CancellationToken) -> Result<u64, ProducerError> {
        self.started.store(true, Ordering::SeqCst);
        while !shutdown.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.cancelled.store(true, Ordering::SeqCst);
        Err(ProducerError::cancelled())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_len<T: Send + 'static>(
    pool: &PreParamsPool<T>,
    expected: usize,
    timeout: Duration,
) -> bool {
    wait_until(timeout, || pool.len() == expected).await
}

/// True if `future` is still pending after `delay`.
pub async fn still_pending<F: Future + Unpin>(future: &mut F, delay: Duration) -> bool {
    tokio::time::timeout(delay, future).await.is_err()
}
