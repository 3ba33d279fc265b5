//! Sign-and-publish pipeline.
//!
//! Stateless: every call runs deserialize, validate, sign, attach witness,
//! serialize and publish, stopping at the first failure. Nothing is
//! broadcast unless every local stage succeeded, and the broadcast is
//! attempted exactly once.

use std::time::Instant;

use bitcoin::secp256k1::{ecdsa::Signature, PublicKey};
use bitcoin::{Transaction, Txid};
use common::{EventType, LogEvent};
use rand_core::CryptoRngCore;
use tracing::{debug, info, warn};

use crate::codec::{deserialize_transaction, serialize_transaction};
use crate::error::{error_chain, PipelineError};
use crate::publisher::ChainPublisher;
use crate::signer::EcdsaSigner;
use crate::witness::set_signature_witness;

/// Only input 0 of a single-input transaction is ever signed.
const SIGNED_INPUT: usize = 0;

/// Finalize a single-input P2WPKH transaction and broadcast it.
///
/// `witness_signature_hash` is the BIP-143 digest of input 0, computed by
/// the caller; it is handed to `signer` untouched. `rng` is consumed only by
/// the signer.
///
/// Returns the txid reported by `publisher`. On
/// [`PipelineError::Publish`] the transaction may or may not have reached
/// the network; the caller has to reconcile before trying again.
pub async fn sign_and_publish<P, S>(
    rng: &mut (dyn CryptoRngCore + Send),
    publisher: &P,
    signer: &S,
    witness_signature_hash: &[u8],
    transaction_preimage: &[u8],
) -> Result<Txid, PipelineError>
where
    P: ChainPublisher + ?Sized,
    S: EcdsaSigner + ?Sized,
{
    let started = Instant::now();

    let mut tx = deserialize_transaction(transaction_preimage).map_err(|e| {
        reject(&e);
        PipelineError::Deserialization(e)
    })?;

    ensure_single_input(&tx).map_err(|e| {
        reject(&e);
        e
    })?;

    let signature = signer.calculate_signature(rng, witness_signature_hash)?;
    debug!("Calculated signature: {}", signature);

    attach_witness(&mut tx, &signature, &signer.public_key())?;

    let raw = serialize_transaction(&tx).map_err(|e| PipelineError::Serialization(Box::new(e)))?;
    debug!("Signed transaction: {}", hex::encode(&raw));

    LogEvent::new(EventType::TransactionSigned)
        .with_correlation_id(tx.compute_txid().to_string())
        .with_context("size_bytes", raw.len())
        .emit();

    match publisher.publish(&raw).await {
        Ok(txid) => {
            info!("Published transaction: {}", txid);
            LogEvent::new(EventType::TransactionPublished)
                .with_correlation_id(txid.to_string())
                .with_duration(started.elapsed())
                .emit();
            Ok(txid)
        }
        Err(e) => {
            let reason = error_chain(&e);
            warn!(
                "Broadcast of {} failed, acceptance unknown: {}",
                tx.compute_txid(),
                reason
            );
            LogEvent::new(EventType::PublishFailed)
                .with_correlation_id(tx.compute_txid().to_string())
                .with_error(reason)
                .emit();
            Err(PipelineError::Publish(e))
        }
    }
}

fn ensure_single_input(tx: &Transaction) -> Result<(), PipelineError> {
    match tx.input.len() {
        1 => Ok(()),
        inputs => Err(PipelineError::UnsupportedTransactionShape { inputs }),
    }
}

/// A witness that cannot be placed means the transaction cannot be
/// serialized as signed.
fn attach_witness(
    tx: &mut Transaction,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<(), PipelineError> {
    set_signature_witness(tx, SIGNED_INPUT, signature, public_key)
        .map_err(|e| PipelineError::Serialization(Box::new(e)))
}

fn reject(err: &dyn std::error::Error) {
    let reason = error_chain(err);
    warn!("Rejected transaction preimage: {}", reason);
    LogEvent::new(EventType::TransactionRejected)
        .with_error(reason)
        .emit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::transaction::Version;
    use bitcoin::{absolute, OutPoint, TxIn};

    fn tx_with_inputs(count: usize) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: (0..count)
                .map(|i| TxIn {
                    previous_output: OutPoint::new(Txid::from_byte_array([i as u8; 32]), 0),
                    ..TxIn::default()
                })
                .collect(),
            output: vec![],
        }
    }

    #[test]
    fn test_single_input_accepted() {
        assert!(ensure_single_input(&tx_with_inputs(1)).is_ok());
    }

    #[test]
    fn test_missing_input_fails_at_serialize_stage() {
        let signer = crate::LocalSigner::from_slice(&[0x5a; 32]).unwrap();
        let signature = signer
            .calculate_signature(&mut rand_core::OsRng, &[0x11; 32])
            .unwrap();
        let mut tx = tx_with_inputs(0);

        let err = attach_witness(&mut tx, &signature, &signer.public_key()).unwrap_err();
        assert!(matches!(err, PipelineError::Serialization(_)));
        assert_eq!(err.stage(), "serialize");
        assert!(err.is_safely_retryable());
        assert!(std::error::Error::source(&err)
            .is_some_and(|cause| cause.is::<crate::WitnessError>()));

        let mut tx = tx_with_inputs(1);
        attach_witness(&mut tx, &signature, &signer.public_key()).unwrap();
        assert_eq!(tx.input[0].witness.len(), 2);
    }

    #[test]
    fn test_other_shapes_rejected() {
        for count in [0, 2, 5] {
            let err = ensure_single_input(&tx_with_inputs(count)).unwrap_err();
            assert!(matches!(
                err,
                PipelineError::UnsupportedTransactionShape { inputs } if inputs == count
            ));
            assert!(err.is_safely_retryable());
        }
    }
}
