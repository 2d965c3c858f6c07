//! TOTP secrets and RFC 6238 code generation
//!
//! Per-service 20-byte secrets come out of the TOTP domain. The index
//! rule here is `HMAC-SHA256(service, "")`, not the plain SHA-256 that
//! SSH and wallet domains use; both call sites are intentional and both
//! are frozen.

use data_encoding::BASE32;
use hmac::{Hmac, Mac};
use keyforge_core::{derive_key, domains, primitives};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::KeygenError;

/// Derived shared-secret length in bytes
pub const SECRET_LEN: usize = 20;

/// HMAC algorithm for code generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotpAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl TotpAlgorithm {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

/// A per-service TOTP shared secret.
pub struct TotpSecret {
    pub service: String,
    secret: Zeroizing<[u8; SECRET_LEN]>,
}

impl TotpSecret {
    pub fn bytes(&self) -> &[u8; SECRET_LEN] {
        &self.secret
    }

    /// RFC 4648 Base32 with `=` padding, the form authenticator apps and
    /// the vault store.
    pub fn base32(&self) -> String {
        BASE32.encode(self.secret.as_slice())
    }

    /// `otpauth://` provisioning URI for QR enrolment.
    pub fn otpauth_uri(&self) -> String {
        format!(
            "otpauth://totp/keyforge:{}?secret={}&issuer=keyforge",
            self.service,
            self.base32()
        )
    }
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep the secret out of debug output
        f.debug_struct("TotpSecret")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Derive the 20-byte shared secret for `service`.
pub fn derive_secret(seed: &[u8; 64], service: &str) -> Result<TotpSecret, KeygenError> {
    let mac = primitives::hmac_sha256(service.as_bytes(), b"");
    let index = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);

    let raw = derive_key(seed, domains::SERVICE_TOTP, index, SECRET_LEN)?;
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    secret.copy_from_slice(&raw);

    Ok(TotpSecret {
        service: service.to_string(),
        secret,
    })
}

/// RFC 6238 code for `secret` at `now_unix`.
///
/// `digits` must be 6 or 8 and `period` 30 or 60 seconds; anything else
/// is an enrolment mistake we refuse rather than mis-encode.
pub fn code(
    secret: &[u8],
    now_unix: u64,
    algorithm: TotpAlgorithm,
    digits: u32,
    period: u64,
) -> Result<String, KeygenError> {
    if digits != 6 && digits != 8 {
        return Err(KeygenError::UnsupportedParameter("digits must be 6 or 8"));
    }
    if period != 30 && period != 60 {
        return Err(KeygenError::UnsupportedParameter(
            "period must be 30 or 60 seconds",
        ));
    }

    let counter = (now_unix / period).to_be_bytes();
    let mac = match algorithm {
        TotpAlgorithm::Sha1 => hmac_once::<Hmac<Sha1>>(secret, &counter),
        TotpAlgorithm::Sha256 => hmac_once::<Hmac<Sha256>>(secret, &counter),
        TotpAlgorithm::Sha512 => hmac_once::<Hmac<Sha512>>(secret, &counter),
    };

    // RFC 4226 dynamic truncation
    let offset = (mac[mac.len() - 1] & 0x0f) as usize;
    let value = u32::from_be_bytes([mac[offset], mac[offset + 1], mac[offset + 2], mac[offset + 3]])
        & 0x7fff_ffff;
    let code = value % 10u32.pow(digits);

    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// Code with the default parameters (SHA-1, 6 digits, 30 seconds).
pub fn code_default(secret: &[u8], now_unix: u64) -> Result<String, KeygenError> {
    code(secret, now_unix, TotpAlgorithm::Sha1, 6, 30)
}

/// Split a code at its midpoint for display: `"123456"` becomes `"123 456"`.
pub fn display(code: &str) -> String {
    let mid = code.len() / 2;
    format!("{} {}", &code[..mid], &code[mid..])
}

fn hmac_once<M: Mac + hmac::digest::KeyInit>(key: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B secrets: the ASCII digits recycled to the
    // digest's natural key length.
    const SHA1_SECRET: &[u8] = b"12345678901234567890";
    const SHA256_SECRET: &[u8] = b"12345678901234567890123456789012";
    const SHA512_SECRET: &[u8] = b"1234567890123456789012345678901234567890123456789012345678901234";

    #[test]
    fn test_rfc6238_vectors_sha1() {
        assert_eq!(
            code(SHA1_SECRET, 59, TotpAlgorithm::Sha1, 8, 30).unwrap(),
            "94287082"
        );
        assert_eq!(
            code(SHA1_SECRET, 1111111109, TotpAlgorithm::Sha1, 8, 30).unwrap(),
            "07081804"
        );
        assert_eq!(
            code(SHA1_SECRET, 20000000000, TotpAlgorithm::Sha1, 8, 30).unwrap(),
            "65353130"
        );
    }

    #[test]
    fn test_rfc6238_vectors_sha256() {
        assert_eq!(
            code(SHA256_SECRET, 59, TotpAlgorithm::Sha256, 8, 30).unwrap(),
            "46119246"
        );
    }

    #[test]
    fn test_rfc6238_vectors_sha512() {
        assert_eq!(
            code(SHA512_SECRET, 59, TotpAlgorithm::Sha512, 8, 30).unwrap(),
            "90693936"
        );
    }

    #[test]
    fn test_six_digit_default() {
        // 6-digit codes are the 8-digit vectors mod 10^6
        assert_eq!(code_default(SHA1_SECRET, 59).unwrap(), "287082");
    }

    #[test]
    fn test_codes_stable_within_period() {
        let a = code_default(SHA1_SECRET, 30).unwrap();
        let b = code_default(SHA1_SECRET, 59).unwrap();
        let c = code_default(SHA1_SECRET, 60).unwrap();
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_parameter_validation() {
        assert!(matches!(
            code(SHA1_SECRET, 59, TotpAlgorithm::Sha1, 7, 30),
            Err(KeygenError::UnsupportedParameter(_))
        ));
        assert!(matches!(
            code(SHA1_SECRET, 59, TotpAlgorithm::Sha1, 6, 45),
            Err(KeygenError::UnsupportedParameter(_))
        ));
        assert!(code(SHA1_SECRET, 59, TotpAlgorithm::Sha1, 8, 60).is_ok());
    }

    #[test]
    fn test_derive_secret_deterministic_per_service() {
        let seed = [0u8; 64];
        let a = derive_secret(&seed, "github.com").unwrap();
        let b = derive_secret(&seed, "github.com").unwrap();
        let c = derive_secret(&seed, "gitlab.com").unwrap();
        assert_eq!(a.bytes(), b.bytes());
        assert_ne!(a.bytes(), c.bytes());
        assert_eq!(a.bytes().len(), SECRET_LEN);
    }

    #[test]
    fn test_base32_form() {
        let seed = [0u8; 64];
        let secret = derive_secret(&seed, "github.com").unwrap();
        let encoded = secret.base32();
        // 20 bytes -> 32 base32 chars, no padding needed at this length
        assert_eq!(encoded.len(), 32);
        assert!(encoded
            .chars()
            .all(|c| ('A'..='Z').contains(&c) || ('2'..='7').contains(&c)));
        assert_eq!(BASE32.decode(encoded.as_bytes()).unwrap(), secret.bytes());
    }

    #[test]
    fn test_base32_padding_on_other_lengths() {
        // RFC 4648: output is padded with '=' to a multiple of 8
        assert_eq!(BASE32.encode(b"f"), "MY======");
        assert_eq!(BASE32.encode(b"fooba"), "MZXW6YTB");
    }

    #[test]
    fn test_display_splits_at_midpoint() {
        assert_eq!(display("123456"), "123 456");
        assert_eq!(display("12345678"), "1234 5678");
    }

    #[test]
    fn test_otpauth_uri() {
        let seed = [0u8; 64];
        let secret = derive_secret(&seed, "example.org").unwrap();
        let uri = secret.otpauth_uri();
        assert!(uri.starts_with("otpauth://totp/keyforge:example.org?secret="));
        assert!(uri.ends_with("&issuer=keyforge"));
    }
}
