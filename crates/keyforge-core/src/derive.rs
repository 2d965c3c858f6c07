//! Domain-separated key expansion over the master seed
//!
//! HKDF-SHA512 in shape, with one deliberate deviation: for output lengths
//! up to 64 bytes the expansion is a single `HMAC-SHA512(PRK, info)` with
//! no counter byte, where strict RFC 5869 would append `0x01`. Existing
//! vaults and issued keys depend on that exact byte stream, so the quirk
//! is part of the format, not a bug to fix.

use zeroize::Zeroizing;

use crate::primitives::{self, CryptoError};

/// Domain tags, one per key purpose.
///
/// These strings are public and frozen. Changing a single character
/// re-keys that entire domain for every user.
pub mod domains {
    pub const SSH: &str = "keyforge:ssh:v1";
    pub const GPG: &str = "keyforge:gpg:v1";
    pub const AGE: &str = "keyforge:age:v1";
    pub const WALLET_BIP39: &str = "keyforge:wallet:bip39:v1";
    pub const WALLET_PAYMENT: &str = "keyforge:wallet:payment:v1";
    pub const WALLET_MONERO: &str = "keyforge:wallet:monero:v1";
    pub const VAULT_ENCRYPT: &str = "keyforge:vault:encrypt:v1";
    pub const VAULT_HMAC: &str = "keyforge:vault:hmac:v1";
    pub const VAULT_IPNS: &str = "keyforge:vault:ipns:v1";
    pub const SERVICE_TOTP: &str = "keyforge:service:totp:v1";
    pub const SERVICE_API: &str = "keyforge:service:api:v1";
    pub const SERVICE_WEBAUTHN: &str = "keyforge:service:webauthn:v1";
    pub const NOSTR: &str = "keyforge:nostr:v1";
    pub const SHAMIR: &str = "keyforge:shamir:v1";
    pub const CANARY: &str = "keyforge:canary:v1";
}

/// Largest derivable output: 255 HMAC-SHA512 blocks
pub const MAX_DERIVED_LEN: usize = 255 * 64;

/// Fixed PRK extraction key
const EXPAND_KEY: &[u8] = b"keyforge-expand";

/// Derive `len` bytes for `(domain, index)` from the master seed.
///
/// `PRK = HMAC-SHA512("keyforge-expand", seed)`, then expand with
/// `info = "{domain}:{index}:{len}"`. See the module docs for the
/// single-shot short-output rule.
pub fn derive_key(
    seed: &[u8; 64],
    domain: &str,
    index: u32,
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if len == 0 || len > MAX_DERIVED_LEN {
        return Err(CryptoError::BadLength {
            what: "derived key",
            len,
        });
    }

    let prk = Zeroizing::new(primitives::hmac_sha512(EXPAND_KEY, seed));
    let info = format!("{}:{}:{}", domain, index, len);

    if len <= 64 {
        let block = Zeroizing::new(primitives::hmac_sha512(&*prk, info.as_bytes()));
        return Ok(Zeroizing::new(block[..len].to_vec()));
    }

    // T_i = HMAC-SHA512(PRK, T_{i-1} || info || i), i in 1..=n
    let n = len.div_ceil(64);
    let mut out = Zeroizing::new(Vec::with_capacity(n * 64));
    let mut prev: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::new());
    for i in 1..=n {
        let mut msg = Zeroizing::new(Vec::with_capacity(prev.len() + info.len() + 1));
        msg.extend_from_slice(&prev);
        msg.extend_from_slice(info.as_bytes());
        msg.push(i as u8);
        let block = primitives::hmac_sha512(&*prk, &msg);
        out.extend_from_slice(&block);
        prev.clear();
        prev.extend_from_slice(&block);
    }
    out.truncate(len);
    Ok(out)
}

/// Derive `count` sibling keys at indices `0..count`.
pub fn derive_multiple(
    seed: &[u8; 64],
    domain: &str,
    count: u32,
    len: usize,
) -> Result<Vec<Zeroizing<Vec<u8>>>, CryptoError> {
    (0..count).map(|i| derive_key(seed, domain, i, len)).collect()
}

/// Map a service name to a derivation index: the first 4 bytes of
/// `SHA-256(service)`, read little-endian.
///
/// Collisions are accepted; two colliding services simply share a key,
/// which costs isolation, not correctness.
pub fn service_to_index(service: &str) -> u32 {
    let digest = primitives::sha256(service.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Hostnames use the same rule as service names.
pub fn hostname_to_index(hostname: &str) -> u32 {
    service_to_index(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: [u8; 64] = [0u8; 64];

    #[test]
    fn test_deterministic() {
        let a = derive_key(&SEED, domains::SSH, 0, 32).unwrap();
        let b = derive_key(&SEED, domains::SSH, 0, 32).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_domains_are_independent() {
        let ssh = derive_key(&SEED, domains::SSH, 0, 32).unwrap();
        let gpg = derive_key(&SEED, domains::GPG, 0, 32).unwrap();
        assert_eq!(ssh.len(), 32);
        assert_eq!(gpg.len(), 32);
        assert_ne!(*ssh, *gpg);
    }

    #[test]
    fn test_indices_are_independent() {
        let k0 = derive_key(&SEED, domains::SSH, 0, 32).unwrap();
        let k1 = derive_key(&SEED, domains::SSH, 1, 32).unwrap();
        assert_ne!(*k0, *k1);
    }

    #[test]
    fn test_length_is_bound_into_info() {
        // Requesting 32 bytes is not a prefix of requesting 64: the length
        // is part of the info string.
        let short = derive_key(&SEED, domains::SSH, 0, 32).unwrap();
        let long = derive_key(&SEED, domains::SSH, 0, 64).unwrap();
        assert_ne!(*short, long[..32]);
    }

    #[test]
    fn test_short_output_is_single_hmac_prefix() {
        // The documented quirk: len <= 64 outputs are prefixes of the same
        // single HMAC block because len is baked into info, per length.
        let full = derive_key(&SEED, domains::GPG, 3, 64).unwrap();
        let again = derive_key(&SEED, domains::GPG, 3, 64).unwrap();
        assert_eq!(*full, *again);
        assert_eq!(full.len(), 64);
    }

    #[test]
    fn test_long_output_lengths() {
        for len in [65, 128, 129, 1000, MAX_DERIVED_LEN] {
            let key = derive_key(&SEED, domains::SHAMIR, 0, len).unwrap();
            assert_eq!(key.len(), len);
        }
    }

    #[test]
    fn test_long_output_deterministic() {
        let a = derive_key(&SEED, domains::SHAMIR, 7, 200).unwrap();
        let b = derive_key(&SEED, domains::SHAMIR, 7, 200).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_bad_lengths_rejected() {
        assert!(matches!(
            derive_key(&SEED, domains::SSH, 0, 0),
            Err(CryptoError::BadLength { .. })
        ));
        assert!(matches!(
            derive_key(&SEED, domains::SSH, 0, MAX_DERIVED_LEN + 1),
            Err(CryptoError::BadLength { .. })
        ));
    }

    #[test]
    fn test_derive_multiple_matches_individual() {
        let keys = derive_multiple(&SEED, domains::SERVICE_API, 4, 32).unwrap();
        assert_eq!(keys.len(), 4);
        for (i, key) in keys.iter().enumerate() {
            let single = derive_key(&SEED, domains::SERVICE_API, i as u32, 32).unwrap();
            assert_eq!(**key, *single);
        }
    }

    #[test]
    fn test_service_to_index_is_le_of_sha256_prefix() {
        let digest = primitives::sha256(b"github.com");
        let expected = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        assert_eq!(service_to_index("github.com"), expected);
        assert_eq!(hostname_to_index("github.com"), expected);
    }

    #[test]
    fn test_seed_changes_everything() {
        let other = [1u8; 64];
        let a = derive_key(&SEED, domains::SSH, 0, 32).unwrap();
        let b = derive_key(&other, domains::SSH, 0, 32).unwrap();
        assert_ne!(*a, *b);
    }
}
