//! Mock collaborators and fixture transactions for pipeline tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    absolute, consensus, Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Txid, Witness,
};
use rand_core::CryptoRngCore;
use threshold_bitcoin::{
    ChainPublisher, EcdsaSigner, LocalSigner, PublicKey, PublishError, Signature, SignerError,
};
use tokio::sync::Mutex;

/// Value of the output being spent by fixture transactions.
pub const PREVOUT_VALUE: Amount = Amount::from_sat(100_000);

/// Publisher recording every broadcast; answers with the computed txid
/// or a fixed rejection.
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<Vec<u8>>>>,
    reject_with: Option<(u16, String)>,
}

impl RecordingPublisher {
    pub fn accepting() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            reject_with: None,
        }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            reject_with: Some((status, body.to_string())),
        }
    }

    pub async fn published(&self) -> Vec<Vec<u8>> {
        self.published.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.published.lock().await.len()
    }
}

#[async_trait]
impl ChainPublisher for RecordingPublisher {
    async fn publish(&self, raw_transaction: &[u8]) -> Result<Txid, PublishError> {
        self.published.lock().await.push(raw_transaction.to_vec());

        if let Some((status, body)) = &self.reject_with {
            return Err(PublishError::Rejected {
                status: *status,
                body: body.clone(),
            });
        }

        let tx: Transaction = consensus::deserialize(raw_transaction)
            .map_err(|e| PublishError::InvalidTxid(e.to_string()))?;
        Ok(tx.compute_txid())
    }
}

/// Local signer that counts how often it was asked to sign.
pub struct CountingSigner {
    inner: LocalSigner,
    calls: AtomicUsize,
}

impl CountingSigner {
    pub fn new() -> Self {
        Self {
            inner: test_signer(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EcdsaSigner for CountingSigner {
    fn calculate_signature(
        &self,
        rng: &mut dyn CryptoRngCore,
        digest: &[u8],
    ) -> Result<Signature, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.calculate_signature(rng, digest)
    }

    fn public_key(&self) -> PublicKey {
        self.inner.public_key()
    }
}

/// Signer standing in for an aborted threshold signing round.
pub struct FailingSigner;

impl EcdsaSigner for FailingSigner {
    fn calculate_signature(
        &self,
        _rng: &mut dyn CryptoRngCore,
        _digest: &[u8],
    ) -> Result<Signature, SignerError> {
        Err(SignerError::Backend("party 2 timed out".to_string()))
    }

    fn public_key(&self) -> PublicKey {
        test_signer().public_key()
    }
}

pub fn test_signer() -> LocalSigner {
    LocalSigner::from_slice(&[0x5a; 32]).unwrap()
}

/// P2WPKH script paying to `public_key`.
pub fn p2wpkh_script(public_key: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&CompressedPublicKey(*public_key).wpubkey_hash())
}

/// Unsigned transaction spending `inputs` P2WPKH outputs of `owner`.
pub fn unsigned_tx(owner: &PublicKey, inputs: usize) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: (0..inputs)
            .map(|i| TxIn {
                previous_output: OutPoint::new(Txid::from_byte_array([0xa0 + i as u8; 32]), i as u32),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::from_sat(90_000),
            script_pubkey: p2wpkh_script(owner),
        }],
    }
}

/// BIP-143 digest of input 0, spending a P2WPKH output of `owner`.
pub fn witness_digest(tx: &Transaction, owner: &PublicKey) -> [u8; 32] {
    SighashCache::new(tx)
        .p2wpkh_signature_hash(0, &p2wpkh_script(owner), PREVOUT_VALUE, EcdsaSighashType::All)
        .unwrap()
        .to_byte_array()
}
