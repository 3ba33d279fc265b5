//! CGGMP24 Threshold ECDSA support.
//!
//! - Pregenerated primes generation
//! - Pre-params pool with background replenishment

pub mod params_pool;
pub mod primes;

pub use params_pool::*;
pub use primes::*;
