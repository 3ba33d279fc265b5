//! Bitcoin transaction finalization for threshold signatures.
//!
//! Takes an unsigned single-input P2WPKH transaction and a caller-computed
//! BIP-143 digest, signs it, attaches the witness and broadcasts it.
//!
//! - [`codec`]: consensus (de)serialization
//! - [`signer`]: the [`EcdsaSigner`] seam and a local implementation
//! - [`witness`]: P2WPKH witness assembly
//! - [`publisher`]: the [`ChainPublisher`] seam and an Esplora client
//! - [`pipeline`]: [`sign_and_publish`]

pub mod codec;
pub mod error;
pub mod pipeline;
pub mod publisher;
pub mod signer;
pub mod witness;

pub use codec::{deserialize_transaction, serialize_transaction};
pub use error::{error_chain, CodecError, PipelineError, PublishError, SignerError, WitnessError};
pub use pipeline::sign_and_publish;
pub use publisher::{esplora_url, parse_network, ChainPublisher, EsploraPublisher};
pub use signer::{signature_from_scalars, verify_signature, EcdsaSigner, LocalSigner};
pub use witness::{p2wpkh_witness, parse_signature_witness, set_signature_witness};

// Re-exported so callers name the same types the traits use.
pub use bitcoin::secp256k1::{ecdsa::Signature, PublicKey, SecretKey};
pub use bitcoin::{Transaction, Txid};
