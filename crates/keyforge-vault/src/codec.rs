//! Vault container codec: compress, encrypt, frame
//!
//! On-disk layout, magic-free (format errors surface as decryption
//! failures):
//!
//! ```text
//! byte 0       nonce length  (always 12)
//! bytes 1..13  nonce
//! byte 13      tag length    (always 16)
//! bytes 14..30 Poly1305 tag
//! bytes 30..   ciphertext of DEFLATE(vault JSON)
//! ```
//!
//! Compression is **raw DEFLATE** with the default level, no zlib
//! wrapper. That framing choice is pinned: inflating with the wrong
//! variant fails, and the failure correctly reads as a corrupt vault.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use keyforge_core::primitives::{self, NONCE_LEN, TAG_LEN};
use zeroize::Zeroizing;

use crate::model::Vault;
use crate::VaultError;

/// A parsed vault container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + NONCE_LEN + TAG_LEN + self.ciphertext.len());
        out.push(NONCE_LEN as u8);
        out.extend_from_slice(&self.nonce);
        out.push(TAG_LEN as u8);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the on-disk layout. Any length-field mismatch is a corrupt
    /// vault, not a recoverable variation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() < 2 + NONCE_LEN + TAG_LEN {
            return Err(VaultError::Corrupt);
        }
        if bytes[0] as usize != NONCE_LEN {
            return Err(VaultError::Corrupt);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1..1 + NONCE_LEN]);

        if bytes[1 + NONCE_LEN] as usize != TAG_LEN {
            return Err(VaultError::Corrupt);
        }
        let tag_start = 2 + NONCE_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[tag_start..tag_start + TAG_LEN]);

        Ok(Self {
            nonce,
            tag,
            ciphertext: bytes[tag_start + TAG_LEN..].to_vec(),
        })
    }
}

/// Compress and encrypt a vault under `key` with a fresh random nonce.
pub fn encrypt(vault: &Vault, key: &[u8; 32]) -> Result<Envelope, VaultError> {
    let nonce_bytes = primitives::random(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_bytes);
    encrypt_with_nonce(vault, key, &nonce)
}

/// Deterministic-nonce encryption, for tests that compare envelopes.
/// Production saves always use [`encrypt`].
pub fn encrypt_with_nonce(
    vault: &Vault,
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
) -> Result<Envelope, VaultError> {
    let json = Zeroizing::new(
        serde_json::to_vec(vault).expect("vault has no unserializable fields"),
    );
    let compressed = Zeroizing::new(deflate(&json)?);
    let (ciphertext, tag) = primitives::chacha20poly1305_seal(key, nonce, &compressed)?;

    Ok(Envelope {
        nonce: *nonce,
        tag,
        ciphertext,
    })
}

/// Decrypt and decompress a container.
///
/// All failure modes (authentication, inflate, JSON parse) collapse to
/// [`VaultError::Corrupt`]; callers cannot distinguish a wrong key from a
/// damaged file, and must not try.
pub fn decrypt(envelope: &Envelope, key: &[u8; 32]) -> Result<Vault, VaultError> {
    let compressed = Zeroizing::new(
        primitives::chacha20poly1305_open(key, &envelope.nonce, &envelope.ciphertext, &envelope.tag)
            .map_err(|_| VaultError::Corrupt)?,
    );
    let json = Zeroizing::new(inflate(&compressed).map_err(|_| VaultError::Corrupt)?);
    let vault: Vault = serde_json::from_slice(&json).map_err(|_| VaultError::Corrupt)?;
    if vault.version != crate::model::VAULT_VERSION {
        return Err(VaultError::Corrupt);
    }
    Ok(vault)
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut out = Vec::new();
    DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PasswordRecord;

    const KEY: [u8; 32] = [0x42; 32];

    fn sample_vault() -> Vault {
        let mut vault = Vault::new();
        let record = PasswordRecord::new("example.com", "alice", "s3cret")
            .with_notes("the main account")
            .with_tags(vec!["work".into(), "email".into()]);
        vault.passwords.insert(record.site.clone(), record);
        vault.refresh_checksum();
        vault
    }

    #[test]
    fn test_roundtrip() {
        let vault = sample_vault();
        let envelope = encrypt(&vault, &KEY).unwrap();
        let decrypted = decrypt(&envelope, &KEY).unwrap();
        assert_eq!(decrypted, vault);
    }

    #[test]
    fn test_envelope_layout() {
        let vault = sample_vault();
        let nonce = [9u8; NONCE_LEN];
        let envelope = encrypt_with_nonce(&vault, &KEY, &nonce).unwrap();
        let bytes = envelope.to_bytes();

        assert_eq!(bytes[0], 12);
        assert_eq!(&bytes[1..13], &nonce);
        assert_eq!(bytes[13], 16);
        assert_eq!(&bytes[14..30], &envelope.tag);
        assert_eq!(&bytes[30..], envelope.ciphertext.as_slice());

        let parsed = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_deterministic_with_fixed_nonce() {
        let vault = sample_vault();
        let nonce = [7u8; NONCE_LEN];
        let a = encrypt_with_nonce(&vault, &KEY, &nonce).unwrap();
        let b = encrypt_with_nonce(&vault, &KEY, &nonce).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fresh_nonce_per_encrypt() {
        let vault = sample_vault();
        let a = encrypt(&vault, &KEY).unwrap();
        let b = encrypt(&vault, &KEY).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_tamper_anywhere_is_corrupt() {
        let vault = sample_vault();
        let envelope = encrypt(&vault, &KEY).unwrap();

        // Flip one bit in the ciphertext, the nonce, and the tag in turn
        let mut ct = envelope.clone();
        ct.ciphertext[0] ^= 0x01;
        assert!(matches!(decrypt(&ct, &KEY), Err(VaultError::Corrupt)));

        let mut nonce = envelope.clone();
        nonce.nonce[0] ^= 0x01;
        assert!(matches!(decrypt(&nonce, &KEY), Err(VaultError::Corrupt)));

        let mut tag = envelope.clone();
        tag.tag[15] ^= 0x80;
        assert!(matches!(decrypt(&tag, &KEY), Err(VaultError::Corrupt)));

        // The untouched envelope still opens
        assert_eq!(decrypt(&envelope, &KEY).unwrap(), vault);
    }

    #[test]
    fn test_wrong_key_is_corrupt() {
        let vault = sample_vault();
        let envelope = encrypt(&vault, &KEY).unwrap();
        let wrong = [0x43; 32];
        assert!(matches!(decrypt(&envelope, &wrong), Err(VaultError::Corrupt)));
    }

    #[test]
    fn test_truncated_and_malformed_frames() {
        let vault = sample_vault();
        let bytes = encrypt(&vault, &KEY).unwrap().to_bytes();

        assert!(matches!(
            Envelope::from_bytes(&bytes[..10]),
            Err(VaultError::Corrupt)
        ));

        let mut bad_nonce_len = bytes.clone();
        bad_nonce_len[0] = 24;
        assert!(matches!(
            Envelope::from_bytes(&bad_nonce_len),
            Err(VaultError::Corrupt)
        ));

        let mut bad_tag_len = bytes.clone();
        bad_tag_len[13] = 32;
        assert!(matches!(
            Envelope::from_bytes(&bad_tag_len),
            Err(VaultError::Corrupt)
        ));
    }

    #[test]
    fn test_compression_shrinks_repetitive_vaults() {
        let mut vault = Vault::new();
        for i in 0..50 {
            let site = format!("site-{i:02}.example.com");
            vault
                .passwords
                .insert(site.clone(), PasswordRecord::new(site, "same-user", "same-pass"));
        }
        let json_len = serde_json::to_vec(&vault).unwrap().len();
        let envelope = encrypt(&vault, &KEY).unwrap();
        assert!(envelope.ciphertext.len() < json_len / 2);
    }
}
