//! Common types shared between the pre-params pool and the Bitcoin pipeline.

pub mod config;
pub mod observability;

pub use config::{BitcoinConfig, ConfigError, LoggingConfig, NodeConfig, PoolConfig};
pub use observability::{init_tracing, EventType, LogEvent, MetricsSnapshot, PoolMetrics};
