//! Error types for transaction finalization and broadcast.
//!
//! Variants that wrap another error expose it through `source()` and keep it
//! out of their own message; use [`error_chain`] to render the whole chain.

use std::error::Error as StdError;

use thiserror::Error;

/// Consensus encoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to deserialize transaction")]
    Deserialize(#[from] bitcoin::consensus::encode::Error),

    #[error("Failed to serialize transaction")]
    Serialize(#[from] bitcoin::io::Error),
}

/// Failures raised by an [`EcdsaSigner`](crate::EcdsaSigner).
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid digest length: expected 32 bytes, got {0}")]
    InvalidDigestLength(usize),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(bitcoin::secp256k1::Error),

    #[error("Invalid signature: {0}")]
    InvalidSignature(bitcoin::secp256k1::Error),

    /// Fault inside a signing backend (e.g. an aborted threshold round).
    #[error("Signing backend error: {0}")]
    Backend(String),
}

/// Failures raised by a [`ChainPublisher`](crate::ChainPublisher).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broadcast request failed")]
    Transport(#[from] reqwest::Error),

    #[error("Broadcast rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Broadcast returned an invalid txid: {0}")]
    InvalidTxid(String),

    #[error("No Esplora endpoint for network: {0}")]
    UnsupportedNetwork(String),
}

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("Input index {index} out of range (transaction has {inputs} inputs)")]
    InputIndexOutOfRange { index: usize, inputs: usize },

    #[error("Malformed P2WPKH witness: {0}")]
    Malformed(String),
}

/// Failure of [`sign_and_publish`](crate::sign_and_publish).
///
/// Every variant except [`Publish`](Self::Publish) happens before anything
/// leaves the process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to deserialize transaction preimage")]
    Deserialization(#[source] CodecError),

    #[error("Unsupported transaction shape: expected exactly 1 input, found {inputs}")]
    UnsupportedTransactionShape { inputs: usize },

    #[error("Failed to sign transaction")]
    Signing(#[from] SignerError),

    #[error("Failed to serialize signed transaction")]
    Serialization(#[source] Box<dyn StdError + Send + Sync>),

    #[error("Failed to publish transaction")]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Deserialization(_) => "deserialize",
            Self::UnsupportedTransactionShape { .. } => "validate",
            Self::Signing(_) => "sign",
            Self::Serialization(_) => "serialize",
            Self::Publish(_) => "publish",
        }
    }

    /// Whether the whole call can be repeated from scratch.
    ///
    /// A publish failure is ambiguous: the node may have accepted the
    /// transaction before the error surfaced.
    pub fn is_safely_retryable(&self) -> bool {
        !matches!(self, Self::Publish(_))
    }
}

/// `err` followed by each of its sources, joined with `": "`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
