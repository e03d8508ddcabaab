use blake2::{Blake2s256, Digest};
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;

use crate::errors::{SnapshotError, SnapshotResult};

/// Hashes `data` with Blake2s-256.
pub fn blake2s(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    hasher.update(data);
    let output = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&output);
    digest
}

/// Hashes `data` under a domain label so digests from different contexts
/// never collide.
pub fn domain_hash(domain: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    hasher.update(domain);
    hasher.update(data);
    let output = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&output);
    digest
}

pub fn generate_keypair() -> Keypair {
    Keypair::generate(&mut OsRng)
}

pub fn sign_message(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> SnapshotResult<()> {
    public_key
        .verify(message, signature)
        .map_err(|err| SnapshotError::Crypto(format!("signature verification failed: {err}")))
}

pub fn address_from_public_key(public_key: &PublicKey) -> String {
    hex::encode(blake2s(public_key.as_bytes()))
}

pub fn public_key_from_hex(data: &str) -> SnapshotResult<PublicKey> {
    let bytes = hex::decode(data)
        .map_err(|err| SnapshotError::Crypto(format!("invalid public key encoding: {err}")))?;
    PublicKey::from_bytes(&bytes)
        .map_err(|err| SnapshotError::Crypto(format!("invalid public key bytes: {err}")))
}

pub fn signature_from_hex(data: &str) -> SnapshotResult<Signature> {
    let bytes = hex::decode(data)
        .map_err(|err| SnapshotError::Crypto(format!("invalid signature encoding: {err}")))?;
    Signature::from_bytes(&bytes)
        .map_err(|err| SnapshotError::Crypto(format!("invalid signature bytes: {err}")))
}

pub fn signature_to_hex(signature: &Signature) -> String {
    hex::encode(signature.to_bytes())
}
