//! Thin wrappers over the cryptographic primitives Keyforge composes.
//!
//! Everything in this module is pure and silent: no logging, no global
//! state. Higher layers decide what to do with failures.

use bitcoin::hashes::{ripemd160 as btc_ripemd160, Hash};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};
use sha3::Keccak256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// AEAD nonce length (ChaCha20-Poly1305)
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length (Poly1305)
pub const TAG_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// Authenticated decryption failed. Deliberately carries no detail:
    /// a wrong key, a flipped bit, and a truncated ciphertext are
    /// indistinguishable to the caller.
    #[error("authenticated decryption failed")]
    AeadFailure,
    #[error("invalid length {len} for {what}")]
    BadLength { what: &'static str, len: usize },
}

/// Fill a fresh buffer with `n` bytes from the OS CSPRNG.
pub fn random(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// Constant-time equality. Returns `false` when lengths differ; the length
/// comparison itself is not constant-time, which is fine because lengths
/// here are public (tags, checksums).
pub fn ct_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Overwrite a buffer with random bytes, then 0xFF, then 0x00.
///
/// The triple pass is the scrub discipline for every long-lived secret
/// buffer in Keyforge; `zeroize` alone is used for short-lived copies.
pub fn scrub(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf);
    buf.fill(0xFF);
    buf.fill(0x00);
}

/// PBKDF2-HMAC-SHA512 into a caller-provided output buffer.
pub fn pbkdf2_sha512(password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, out);
}

pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

pub fn hmac_sha512(key: &[u8], msg: &[u8]) -> [u8; 64] {
    let mut mac =
        <Hmac<Sha512> as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    btc_ripemd160::Hash::hash(data).to_byte_array()
}

/// Keccak-256 (the pre-standard SHA-3 variant Ethereum uses).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// ChaCha20-Poly1305 encryption with empty AAD.
///
/// Returns the ciphertext and the 16-byte tag separately; the vault
/// envelope stores them in separate fields.
pub fn chacha20poly1305_seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::AeadFailure)?;

    // The aead crate appends the tag to the ciphertext.
    let split = sealed.len() - TAG_LEN;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&sealed[split..]);
    sealed.truncate(split);
    Ok((sealed, tag))
}

/// ChaCha20-Poly1305 decryption with empty AAD.
///
/// Any failure, including a tampered tag, maps to [`CryptoError::AeadFailure`].
pub fn chacha20poly1305_open(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
        .map_err(|_| CryptoError::AeadFailure)
}
