//! P2WPKH witness assembly.
//!
//! Witness stack for a P2WPKH spend: `<DER signature || sighash byte> <compressed pubkey>`.

use bitcoin::secp256k1::{ecdsa::Signature, PublicKey};
use bitcoin::{ecdsa, Transaction, Witness};

use crate::error::WitnessError;

/// Build the two-element witness, normalising the signature to low-S first.
pub fn p2wpkh_witness(signature: &Signature, public_key: &PublicKey) -> Witness {
    let mut signature = *signature;
    signature.normalize_s();

    let mut witness = Witness::new();
    witness.push(ecdsa::Signature::sighash_all(signature).to_vec());
    witness.push(public_key.serialize());
    witness
}

/// Replace the witness of `input_index` with a P2WPKH witness.
pub fn set_signature_witness(
    tx: &mut Transaction,
    input_index: usize,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<(), WitnessError> {
    let inputs = tx.input.len();
    let input = tx
        .input
        .get_mut(input_index)
        .ok_or(WitnessError::InputIndexOutOfRange {
            index: input_index,
            inputs,
        })?;

    input.witness = p2wpkh_witness(signature, public_key);
    Ok(())
}

/// Decode a P2WPKH witness back into its signature and public key.
pub fn parse_signature_witness(
    witness: &Witness,
) -> Result<(ecdsa::Signature, PublicKey), WitnessError> {
    if witness.len() != 2 {
        return Err(WitnessError::Malformed(format!(
            "expected 2 elements, found {}",
            witness.len()
        )));
    }

    let (Some(sig_bytes), Some(key_bytes)) = (witness.nth(0), witness.nth(1)) else {
        return Err(WitnessError::Malformed("missing element".to_string()));
    };

    let signature = ecdsa::Signature::from_slice(sig_bytes)
        .map_err(|e| WitnessError::Malformed(format!("signature: {}", e)))?;
    let public_key = PublicKey::from_slice(key_bytes)
        .map_err(|e| WitnessError::Malformed(format!("public key: {}", e)))?;

    Ok((signature, public_key))
}
