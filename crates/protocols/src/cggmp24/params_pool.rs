//! Pre-params pool for distributed key generation.
//!
//! Keeps up to `capacity` expensive parameter objects ready so a keygen round
//! does not wait for generation. A background replenisher refills every slot
//! a consumer frees.
//!
//! # Accounting
//!
//! - `free_slots` holds one permit per slot that is neither filled nor being
//!   produced into. The replenisher acquires a permit before it calls the
//!   producer and forgets it once the object is queued.
//! - A failed production drops the permit, returning the slot.
//! - A successful take adds a permit back.
//!
//! The queue is a bounded MPMC channel with the same capacity, so its length
//! stays in `[0, capacity]` no matter how many replenishers or takers run.
//!
//! # Shutdown
//!
//! Each production runs on its own detached thread rather than the runtime's
//! blocking pool, so neither a stopped replenisher nor a dropped runtime
//! waits for a generation that is still in progress. Producers that can stop
//! early observe the shutdown token through
//! [`ParamsProducer::produce_cancellable`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{EventType, LogEvent, MetricsSnapshot, PoolConfig, PoolMetrics};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POOL_LABEL: &str = "pre-params-pool";
const PRODUCER_THREAD: &str = "pre-params-producer";

/// Errors returned by pool operations.
///
/// Producer failures never show up here: they are retried by the replenisher.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool capacity must be at least 1")]
    InvalidCapacity,

    #[error("no pre-params became available within {0:?}")]
    Timeout(Duration),
}

/// Failure of a single generation attempt.
#[derive(Debug, Error)]
#[error("pre-params generation failed: {message}")]
pub struct ProducerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProducerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Generation abandoned because the replenisher is shutting down.
    pub fn cancelled() -> Self {
        Self::new(CANCELLED)
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_none() && self.message == CANCELLED
    }
}

const CANCELLED: &str = "cancelled by shutdown";

/// Generates one parameter object. May take seconds and may fail transiently.
///
/// Called on a dedicated thread, never on an async worker.
pub trait ParamsProducer: Send + Sync + 'static {
    type Output: Send + 'static;

    fn produce(&self) -> Result<Self::Output, ProducerError>;

    /// Variant called by the replenisher. Producers able to stop part way
    /// should poll `shutdown` and return [`ProducerError::cancelled`].
    fn produce_cancellable(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Self::Output, ProducerError> {
        if shutdown.is_cancelled() {
            return Err(ProducerError::cancelled());
        }
        self.produce()
    }
}

impl<T, F> ParamsProducer for F
where
    F: Fn() -> Result<T, ProducerError> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn produce(&self) -> Result<T, ProducerError> {
        self()
    }
}

struct PoolInner<T: Send + 'static> {
    sender: async_channel::Sender<T>,
    receiver: async_channel::Receiver<T>,
    free_slots: Semaphore,
    producer: Arc<dyn ParamsProducer<Output = T>>,
    capacity: usize,
    retry_initial_backoff: Duration,
    retry_max_backoff: Duration,
    metrics: PoolMetrics,
}

/// Bounded pool of pre-generated parameters.
///
/// Cloning yields another handle to the same pool.
pub struct PreParamsPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for PreParamsPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> PreParamsPool<T> {
    /// Create an empty pool. Nothing is generated until a replenisher runs.
    pub fn new<P>(config: &PoolConfig, producer: P) -> Result<Self, PoolError>
    where
        P: ParamsProducer<Output = T>,
    {
        if config.size == 0 {
            return Err(PoolError::InvalidCapacity);
        }

        let (sender, receiver) = async_channel::bounded(config.size);
        let retry_initial_backoff = config.retry_initial_backoff();

        Ok(Self {
            inner: Arc::new(PoolInner {
                sender,
                receiver,
                free_slots: Semaphore::new(config.size),
                producer: Arc::new(producer),
                capacity: config.size,
                retry_initial_backoff,
                retry_max_backoff: config.retry_max_backoff().max(retry_initial_backoff),
                metrics: PoolMetrics::new(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of parameter objects ready to be taken.
    pub fn len(&self) -> usize {
        self.inner.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.receiver.is_empty()
    }

    /// Take a parameter object, waiting until one is produced if the pool is empty.
    pub async fn take(&self) -> T {
        match self.inner.receiver.recv().await {
            Ok(params) => self.consumed(params),
            Err(_) => unreachable!("pool holds its own sender, channel cannot close"),
        }
    }

    /// Blocking variant of [`take`](Self::take) for synchronous callers.
    ///
    /// Must not be called from an async worker thread.
    pub fn take_blocking(&self) -> T {
        match self.inner.receiver.recv_blocking() {
            Ok(params) => self.consumed(params),
            Err(_) => unreachable!("pool holds its own sender, channel cannot close"),
        }
    }

    /// Take a parameter object only if one is ready.
    pub fn try_take(&self) -> Option<T> {
        self.inner
            .receiver
            .try_recv()
            .ok()
            .map(|params| self.consumed(params))
    }

    /// Take with an upper bound on the wait.
    ///
    /// A timed-out call consumes nothing.
    pub async fn take_timeout(&self, timeout: Duration) -> Result<T, PoolError> {
        tokio::time::timeout(timeout, self.take())
            .await
            .map_err(|_| PoolError::Timeout(timeout))
    }

    fn consumed(&self, params: T) -> T {
        self.inner.free_slots.add_permits(1);
        self.inner.metrics.record_consumed();

        info!(
            "Took pre-params from pool, remaining: {}/{}",
            self.len(),
            self.inner.capacity
        );
        LogEvent::new(EventType::ParamsConsumed)
            .with_correlation_id(POOL_LABEL)
            .with_context("remaining", self.len())
            .emit();

        params
    }

    /// Keep the pool full until `shutdown` is cancelled.
    ///
    /// Producer failures (and panics) are logged and retried with exponential
    /// back-off; they never end the loop.
    pub async fn replenish(&self, shutdown: CancellationToken) {
        info!(
            "Starting pre-params replenisher (capacity: {})",
            self.inner.capacity
        );
        LogEvent::new(EventType::ReplenisherStarted)
            .with_correlation_id(POOL_LABEL)
            .with_context("capacity", self.inner.capacity)
            .emit();

        let mut backoff = self.inner.retry_initial_backoff;
        let mut consecutive_failures: u32 = 0;

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = self.inner.free_slots.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            debug!("Generating new pre-params");
            let started = Instant::now();

            let failure = match self.spawn_production(&shutdown) {
                Err(e) => format!("failed to spawn producer thread: {}", e),
                Ok(result) => {
                    let result = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        result = result => result,
                    };

                    match result {
                        Ok(Ok(params)) => {
                            if self.inner.sender.send(params).await.is_err() {
                                break;
                            }
                            permit.forget();

                            let elapsed = started.elapsed();
                            self.inner.metrics.record_produced(elapsed);
                            backoff = self.inner.retry_initial_backoff;
                            consecutive_failures = 0;

                            info!(
                                "Added pre-params to pool, pool size: {}/{} (generated in {:.2}s)",
                                self.len(),
                                self.inner.capacity,
                                elapsed.as_secs_f64()
                            );
                            LogEvent::new(EventType::ParamsProduced)
                                .with_correlation_id(POOL_LABEL)
                                .with_duration(elapsed)
                                .with_context("pool_size", self.len())
                                .emit();
                            continue;
                        }
                        Ok(Err(e)) => e.to_string(),
                        // Sender dropped without a result: the producer panicked
                        Err(_) => {
                            error!("Pre-params producer panicked");
                            "producer panicked".to_string()
                        }
                    }
                }
            };

            drop(permit);
            consecutive_failures += 1;
            self.inner.metrics.record_production_failure();

            warn!(
                "Failed to generate pre-params (attempt {}): {}; retrying in {:?}",
                consecutive_failures, failure, backoff
            );
            LogEvent::new(EventType::ProductionFailed)
                .with_correlation_id(POOL_LABEL)
                .with_context("consecutive_failures", consecutive_failures)
                .with_error(&failure)
                .emit();

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.inner.retry_max_backoff);
        }

        info!("Pre-params replenisher stopped");
        LogEvent::new(EventType::ReplenisherStopped)
            .with_correlation_id(POOL_LABEL)
            .emit();
    }

    /// Run one production on a detached thread; the result arrives on the
    /// returned channel.
    fn spawn_production(
        &self,
        shutdown: &CancellationToken,
    ) -> std::io::Result<oneshot::Receiver<Result<T, ProducerError>>> {
        let producer = Arc::clone(&self.inner.producer);
        let shutdown = shutdown.clone();
        let (result_tx, result_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(PRODUCER_THREAD.into())
            .spawn(move || {
                // The replenisher may have stopped listening
                let _ = result_tx.send(producer.produce_cancellable(&shutdown));
            })?;

        Ok(result_rx)
    }

    /// Run [`replenish`](Self::replenish) as a background task.
    pub fn spawn_replenisher(&self) -> ReplenisherHandle {
        let shutdown = CancellationToken::new();
        let pool = self.clone();
        let token = shutdown.clone();
        let task = tokio::spawn(async move { pool.replenish(token).await });

        ReplenisherHandle {
            shutdown,
            task: Some(task),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        let size = self.len();
        let metrics = self.inner.metrics.snapshot();

        PoolStats {
            current_size: size,
            capacity: self.inner.capacity,
            utilization: (size as f64 / self.inner.capacity as f64 * 100.0) as u32,
            total_produced: metrics.produced,
            total_consumed: metrics.consumed,
            production_failures: metrics.production_failures,
        }
    }
}

/// Owns a running replenisher task.
///
/// Dropping the handle stops the loop; [`shutdown`](Self::shutdown) also
/// waits for the task to exit.
pub struct ReplenisherHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReplenisherHandle {
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    pub async fn shutdown(mut self) {
        self.shutdown.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Pre-params replenisher task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ReplenisherHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Statistics about the pre-params pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub current_size: usize,
    pub capacity: usize,
    pub utilization: u32, // percentage
    pub total_produced: u64,
    pub total_consumed: u64,
    pub production_failures: u64,
}

impl PoolStats {
    /// Check if the pool is healthy (at least 50% full).
    pub fn is_healthy(&self) -> bool {
        self.utilization >= 50
    }

    /// Check if the pool is critically low (less than 25% full).
    pub fn is_critical(&self) -> bool {
        self.utilization < 25
    }
}
