//! MPC protocol support.
//!
//! Currently provides the CGGMP24 pre-params pool: a warm, bounded cache of
//! expensive parameter objects (pregenerated Paillier primes) that a
//! distributed key generation round takes from before it starts.

pub mod cggmp24;

pub use cggmp24::{
    deserialize_primes, generate_primes, ParamsProducer, PoolError, PoolStats, PreParamsPool,
    PrimesProducer, ProducerError, ReplenisherHandle, StoredPrimes,
};
