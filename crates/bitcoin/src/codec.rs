//! Consensus encoding of transactions.

use bitcoin::consensus::{self, Encodable};
use bitcoin::Transaction;

use crate::error::CodecError;

/// Decode a consensus-encoded transaction. Trailing bytes are rejected.
pub fn deserialize_transaction(bytes: &[u8]) -> Result<Transaction, CodecError> {
    Ok(consensus::deserialize(bytes)?)
}

/// Encode a transaction exactly as Bitcoin Core would.
pub fn serialize_transaction(tx: &Transaction) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(tx.total_size());
    tx.consensus_encode(&mut raw)?;
    Ok(raw)
}
