//! Crypto envelope (spec §4.2 / §9): AES-256-GCM body encryption under a
//! per-frame session key, itself wrapped with RSA-OAEP for the recipient.
//!
//! Grounded on `jfabienke-mbuscrate`'s `wmbus/crypto.rs` for the
//! `aead::Aead` call shape and its `*Error` variant naming; RSA-OAEP has no
//! precedent in the retrieval pack and is added fresh from the same
//! RustCrypto family as `aes-gcm`/`sha2`.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{CodecError, Result};

pub const SESSION_KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const WRAPPED_KEY_LEN: usize = 256;
pub const RSA_KEY_BITS: usize = 2048;

/// Key material the codec needs but does not manage on disk (spec §1: key
/// management on disk is an external collaborator). A caller hands over
/// whatever it has; either side may be absent depending on the direction.
pub trait KeyProvider {
    /// The intended recipient's public key, used to wrap a fresh session key
    /// at encode time.
    fn recipient_public_key(&self) -> Result<RsaPublicKey>;

    /// This host's own private key, used to unwrap the session key at
    /// decode time.
    fn own_private_key(&self) -> Result<RsaPrivateKey>;
}

/// A `KeyProvider` backed by in-memory keys, for tests and for callers that
/// already hold the keys (e.g. a CLI that just read them off disk).
pub struct StaticKeyProvider {
    pub recipient_public: RsaPublicKey,
    pub own_private: RsaPrivateKey,
}

impl KeyProvider for StaticKeyProvider {
    fn recipient_public_key(&self) -> Result<RsaPublicKey> {
        Ok(self.recipient_public.clone())
    }

    fn own_private_key(&self) -> Result<RsaPrivateKey> {
        Ok(self.own_private.clone())
    }
}

pub fn generate_keypair() -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| CodecError::InvalidConfig(format!("RSA keygen failed: {e}")))?;
    let public = RsaPublicKey::from(&private);
    Ok((private, public))
}

pub fn generate_session_key() -> [u8; SESSION_KEY_LEN] {
    let mut key = [0u8; SESSION_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// RSA-OAEP(SHA-256, MGF1-SHA-256) wrap of a 32-byte session key under the
/// recipient's 2048-bit public key. Always produces a 256-byte blob.
pub fn wrap_key(pubkey: &RsaPublicKey, key: &[u8; SESSION_KEY_LEN]) -> Result<Vec<u8>> {
    let padding = Oaep::new::<Sha256>();
    let blob = pubkey
        .encrypt(&mut OsRng, padding, key.as_slice())
        .map_err(|e| CodecError::InvalidConfig(format!("RSA-OAEP wrap failed: {e}")))?;
    if blob.len() != WRAPPED_KEY_LEN {
        return Err(CodecError::InvalidConfig(format!(
            "wrapped key blob is {} bytes, expected {}",
            blob.len(),
            WRAPPED_KEY_LEN
        )));
    }
    Ok(blob)
}

/// Unwraps a session key; any failure (wrong key, corrupt blob) is reported
/// as `AuthFailed` per spec §4.2 rather than leaking which step failed.
pub fn unwrap_key(privkey: &RsaPrivateKey, blob: &[u8]) -> Result<[u8; SESSION_KEY_LEN]> {
    let padding = Oaep::new::<Sha256>();
    let plaintext = privkey
        .decrypt(padding, blob)
        .map_err(|_| CodecError::AuthFailed)?;
    plaintext
        .try_into()
        .map_err(|_| CodecError::AuthFailed)
}

/// AES-256-GCM seal with no associated data, per spec §4.2. Returns
/// ciphertext and tag separately so the caller can place them in the
/// header/trailer fields spec §3 prescribes.
pub fn aead_seal(
    key: &[u8; SESSION_KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CodecError::InvalidConfig(format!("bad AES key: {e}")))?;
    let combined = cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad: &[] })
        .map_err(|_| CodecError::AuthFailed)?;
    let split_at = combined.len() - TAG_LEN;
    let (ciphertext, tag) = combined.split_at(split_at);
    let mut tag_arr = [0u8; TAG_LEN];
    tag_arr.copy_from_slice(tag);
    Ok((ciphertext.to_vec(), tag_arr))
}

/// AES-256-GCM open. Any tag mismatch, bit flip in ciphertext, or wrong key
/// yields `AuthFailed` and is never retried (spec §7: retrying an AEAD
/// failure would leak an oracle).
pub fn aead_open(
    key: &[u8; SESSION_KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CodecError::InvalidConfig(format!("bad AES key: {e}")))?;
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: &combined, aad: &[] })
        .map_err(|_| CodecError::AuthFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_round_trips() {
        let key = generate_session_key();
        let nonce = generate_nonce();
        let plaintext = b"session payload bytes".to_vec();
        let (ciphertext, tag) = aead_seal(&key, &nonce, &plaintext).unwrap();
        let decrypted = aead_open(&key, &nonce, &ciphertext, &tag).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn flipped_ciphertext_bit_fails_auth() {
        let key = generate_session_key();
        let nonce = generate_nonce();
        let plaintext = b"session payload bytes".to_vec();
        let (mut ciphertext, tag) = aead_seal(&key, &nonce, &plaintext).unwrap();
        ciphertext[0] ^= 0x01;
        assert!(matches!(aead_open(&key, &nonce, &ciphertext, &tag), Err(CodecError::AuthFailed)));
    }

    #[test]
    fn flipped_tag_bit_fails_auth() {
        let key = generate_session_key();
        let nonce = generate_nonce();
        let plaintext = b"session payload bytes".to_vec();
        let (ciphertext, mut tag) = aead_seal(&key, &nonce, &plaintext).unwrap();
        tag[0] ^= 0x01;
        assert!(matches!(aead_open(&key, &nonce, &ciphertext, &tag), Err(CodecError::AuthFailed)));
    }

    #[test]
    fn rsa_oaep_wrap_round_trips() {
        let (private, public) = generate_keypair().unwrap();
        let key = generate_session_key();
        let blob = wrap_key(&public, &key).unwrap();
        assert_eq!(blob.len(), WRAPPED_KEY_LEN);
        let unwrapped = unwrap_key(&private, &blob).unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn rsa_unwrap_with_wrong_key_fails() {
        let (_, public) = generate_keypair().unwrap();
        let (other_private, _) = generate_keypair().unwrap();
        let key = generate_session_key();
        let blob = wrap_key(&public, &key).unwrap();
        assert!(matches!(unwrap_key(&other_private, &blob), Err(CodecError::AuthFailed)));
    }
}
