//! Clear values sealed to a decryption session key.
//!
//! The relayer answers each handle with a ChaCha20-Poly1305 ciphertext under a key
//! derived from X25519(relayer, session) with HKDF-SHA256,
//! salt = SHA256(session_pk || relayer_pk). The handle is the associated data, so a
//! value cannot be replayed for another handle.

use chacha20poly1305::{
    AeadCore, ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload, rand_core::OsRng},
};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zaswap_core::{EncryptedHandle, EphemeralKeypair};

const SEAL_INFO: &[u8] = b"zaswap-user-decrypt-v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    #[error("invalid {field} length: {got}")]
    Length { field: &'static str, got: usize },
    #[error("sealed value could not be opened (bad key or mac)")]
    Open,
    #[error("encryption failure")]
    Seal,
    #[error("key derivation failure")]
    Kdf,
}

/// One sealed clear value as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedValue {
    pub relayer_public_key: [u8; 32],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

fn session_cipher(
    shared_secret: [u8; 32],
    session_pk: &[u8; 32],
    relayer_pk: &[u8; 32],
) -> Result<ChaCha20Poly1305, SealError> {
    let mut hasher = Sha256::new();
    hasher.update(session_pk);
    hasher.update(relayer_pk);
    let salt = hasher.finalize();

    let hk = Hkdf::<Sha256>::new(Some(&salt), &shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(SEAL_INFO, &mut okm).map_err(|_| SealError::Kdf)?;
    Ok(ChaCha20Poly1305::new(Key::from_slice(&okm)))
}

/// Relayer side: seals `value` for the session that published `session_pk`
pub fn seal_clear_value(
    session_pk: &[u8; 32],
    handle: &EncryptedHandle,
    value: u128,
) -> Result<SealedValue, SealError> {
    let relayer_secret = StaticSecret::random();
    let relayer_pk = *PublicKey::from(&relayer_secret).as_bytes();
    let shared = relayer_secret
        .diffie_hellman(&PublicKey::from(*session_pk))
        .to_bytes();

    let cipher = session_cipher(shared, session_pk, &relayer_pk)?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let plaintext = value.to_be_bytes();
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: &plaintext,
                aad: &handle.0,
            },
        )
        .map_err(|_| SealError::Seal)?;

    let mut nonce_bytes = [0u8; 12];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    Ok(SealedValue {
        relayer_public_key: relayer_pk,
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Session side: recovers the clear value for `handle`
pub fn open_clear_value(
    keypair: &EphemeralKeypair,
    handle: &EncryptedHandle,
    sealed: &SealedValue,
) -> Result<u128, SealError> {
    let session_pk = keypair.public_key_bytes();
    let shared = keypair.diffie_hellman(&sealed.relayer_public_key);
    let cipher = session_cipher(shared, &session_pk, &sealed.relayer_public_key)?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: &handle.0,
            },
        )
        .map_err(|_| SealError::Open)?;

    let bytes: [u8; 16] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| SealError::Length {
            field: "plaintext",
            got: plaintext.len(),
        })?;
    Ok(u128::from_be_bytes(bytes))
}
