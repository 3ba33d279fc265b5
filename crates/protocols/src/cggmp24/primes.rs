//! Pregenerated primes.
//!
//! CGGMP24 auxiliary info generation needs Paillier safe primes. Finding
//! them takes 30-120 seconds for 2048-bit primes, which makes them the
//! parameter objects the pre-params pool keeps warm.

use std::time::Instant;

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::params_pool::{ParamsProducer, ProducerError};

pub type SecurityLevel = cggmp24::security_level::SecurityLevel128;

/// Serializable wrapper around `cggmp24::PregeneratedPrimes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPrimes {
    /// Version for future compatibility
    pub version: u32,
    /// Party index this was generated for
    pub party_index: u16,
    /// Serialized primes data (bincode format)
    #[serde(with = "base64_bytes")]
    pub primes_data: Vec<u8>,
    /// Unix seconds
    pub generated_at: i64,
}

impl StoredPrimes {
    pub const CURRENT_VERSION: u32 = 1;
}

/// Custom serialization for binary data as base64
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Generate new pregenerated primes using cggmp24.
///
/// This is computationally expensive and may take 30-120 seconds.
pub fn generate_primes(party_index: u16) -> Result<StoredPrimes, ProducerError> {
    info!("Generating pregenerated primes for party {}", party_index);
    let start = Instant::now();

    let primes: cggmp24::PregeneratedPrimes<SecurityLevel> =
        cggmp24::PregeneratedPrimes::generate(&mut OsRng);

    info!(
        "Prime generation completed in {:.2}s",
        start.elapsed().as_secs_f64()
    );

    let primes_data = bincode::serialize(&primes)
        .map_err(|e| ProducerError::with_source("failed to serialize primes", e))?;

    Ok(StoredPrimes {
        version: StoredPrimes::CURRENT_VERSION,
        party_index,
        primes_data,
        generated_at: chrono::Utc::now().timestamp(),
    })
}

/// Deserialize primes data back to `cggmp24::PregeneratedPrimes`.
pub fn deserialize_primes(
    data: &[u8],
) -> Result<cggmp24::PregeneratedPrimes<SecurityLevel>, bincode::Error> {
    bincode::deserialize(data)
}

/// Producer plugged into the pre-params pool for a given party.
#[derive(Debug, Clone, Copy)]
pub struct PrimesProducer {
    party_index: u16,
}

impl PrimesProducer {
    pub fn new(party_index: u16) -> Self {
        Self { party_index }
    }

    pub fn party_index(&self) -> u16 {
        self.party_index
    }
}

impl ParamsProducer for PrimesProducer {
    type Output = StoredPrimes;

    fn produce(&self) -> Result<StoredPrimes, ProducerError> {
        generate_primes(self.party_index)
    }
}
