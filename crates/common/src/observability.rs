//! Observability primitives.
//!
//! - **Structured events**: [`LogEvent`] emitted through `tracing`
//! - **Metrics**: [`PoolMetrics`], atomic counters owned by a pool instance
//! - **Subscriber setup**: [`init_tracing`], for binaries only
//!
//! Nothing in this module keeps process-wide state apart from the tracing
//! subscriber a binary installs once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Standardized event types for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Pool lifecycle
    ReplenisherStarted,
    ReplenisherStopped,
    ParamsProduced,
    ParamsConsumed,
    ProductionFailed,

    // Transaction pipeline
    TransactionRejected,
    TransactionSigned,
    TransactionPublished,
    PublishFailed,
}

impl EventType {
    fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ProductionFailed | Self::TransactionRejected | Self::PublishFailed
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ReplenisherStarted => "replenisher_started",
            Self::ReplenisherStopped => "replenisher_stopped",
            Self::ParamsProduced => "params_produced",
            Self::ParamsConsumed => "params_consumed",
            Self::ProductionFailed => "production_failed",
            Self::TransactionRejected => "transaction_rejected",
            Self::TransactionSigned => "transaction_signed",
            Self::TransactionPublished => "transaction_published",
            Self::PublishFailed => "publish_failed",
        };
        write!(f, "{}", s)
    }
}

/// A structured log event with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event_type: EventType,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Correlation ID (pool name, txid, ...).
    pub correlation_id: Option<String>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub context: HashMap<String, String>,
    pub error: Option<String>,
}

impl LogEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            correlation_id: None,
            duration_ms: None,
            context: HashMap::new(),
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Emit this event using tracing.
    pub fn emit(&self) {
        let json = serde_json::to_string(&self).unwrap_or_default();

        if self.event_type.is_failure() {
            tracing::warn!(event = %json, "observability_event");
        } else {
            tracing::debug!(event = %json, "observability_event");
        }
    }
}

/// Counters for a single pre-params pool.
///
/// Thread-safe; shared between the replenisher and the takers through the
/// pool handle.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    produced: AtomicU64,
    consumed: AtomicU64,
    production_failures: AtomicU64,
    production_time_ms: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_produced(&self, elapsed: Duration) {
        self.produced.fetch_add(1, Ordering::Relaxed);
        self.production_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_production_failure(&self) {
        self.production_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    pub fn production_failures(&self) -> u64 {
        self.production_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let produced = self.produced();
        let total_ms = self.production_time_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            produced,
            consumed: self.consumed(),
            production_failures: self.production_failures(),
            avg_production_ms: if produced > 0 {
                total_ms as f64 / produced as f64
            } else {
                0.0
            },
        }
    }
}

/// A snapshot of pool counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp_ms: i64,
    pub produced: u64,
    pub consumed: u64,
    pub production_failures: u64,
    pub avg_production_ms: f64,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
