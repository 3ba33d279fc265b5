//! ECDSA signing seam.
//!
//! The pipeline only needs "digest in, (r, s) out" plus the public key the
//! signature verifies under. A threshold signing round implements
//! [`EcdsaSigner`] by running the protocol and converting its output with
//! [`signature_from_scalars`]; [`LocalSigner`] holds a single key and is
//! what tests and single-party tooling use.

use bitcoin::secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use rand_core::{CryptoRngCore, RngCore};

use crate::error::SignerError;

pub trait EcdsaSigner: Send + Sync {
    /// Sign a 32-byte digest. `rng` is the only entropy source used.
    fn calculate_signature(
        &self,
        rng: &mut dyn CryptoRngCore,
        digest: &[u8],
    ) -> Result<Signature, SignerError>;

    fn public_key(&self) -> PublicKey;
}

/// Signer holding the full secret key in memory.
pub struct LocalSigner {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl LocalSigner {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secp,
            secret_key,
            public_key,
        }
    }

    pub fn from_slice(secret_key: &[u8]) -> Result<Self, SignerError> {
        let secret_key = SecretKey::from_slice(secret_key).map_err(SignerError::InvalidSecretKey)?;
        Ok(Self::new(secret_key))
    }

    /// Fresh random key.
    pub fn generate(rng: &mut dyn CryptoRngCore) -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            // Out-of-range scalars are vanishingly rare; draw again.
            if let Ok(secret_key) = SecretKey::from_slice(&bytes) {
                return Self::new(secret_key);
            }
        }
    }
}

impl EcdsaSigner for LocalSigner {
    /// RFC 6979 nonce with 32 bytes of extra entropy from `rng`.
    ///
    /// The same key, digest and rng output always yield the same signature.
    fn calculate_signature(
        &self,
        rng: &mut dyn CryptoRngCore,
        digest: &[u8],
    ) -> Result<Signature, SignerError> {
        let message = message_from_digest(digest)?;

        let mut nonce_data = [0u8; 32];
        rng.fill_bytes(&mut nonce_data);

        Ok(self
            .secp
            .sign_ecdsa_with_noncedata(&message, &self.secret_key, &nonce_data))
    }

    fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

/// Build a low-S signature from the raw scalars of a signing round.
pub fn signature_from_scalars(r: &[u8; 32], s: &[u8; 32]) -> Result<Signature, SignerError> {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);

    let mut signature = Signature::from_compact(&compact).map_err(SignerError::InvalidSignature)?;
    signature.normalize_s();
    Ok(signature)
}

/// Check `signature` over `digest` against `public_key`.
pub fn verify_signature(
    public_key: &PublicKey,
    digest: &[u8],
    signature: &Signature,
) -> Result<(), SignerError> {
    let message = message_from_digest(digest)?;
    Secp256k1::verification_only()
        .verify_ecdsa(&message, signature, public_key)
        .map_err(SignerError::InvalidSignature)
}

fn message_from_digest(digest: &[u8]) -> Result<Message, SignerError> {
    let digest: [u8; 32] = digest
        .try_into()
        .map_err(|_| SignerError::InvalidDigestLength(digest.len()))?;
    Ok(Message::from_digest(digest))
}
