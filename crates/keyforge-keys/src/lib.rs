//! Keyforge Keys
//!
//! Per-domain output encoders over the master seed: OpenSSH keypairs,
//! Keyforge-armored signing keys, BIP-39/32 wallets, and TOTP secrets.
//! Every generator is deterministic in `(seed, service)`; run it twice and
//! the bytes match.

pub mod gpg;
pub mod ssh;
pub mod totp;
pub mod wallet;

use keyforge_core::CryptoError;
use thiserror::Error;

pub use gpg::{GpgIdentity, GpgKey};
pub use ssh::SshKey;
pub use totp::{TotpAlgorithm, TotpSecret};
pub use wallet::{PaymentWallet, Wallet};

#[derive(Error, Debug)]
pub enum KeygenError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("derivation failed: {0}")]
    Derivation(String),
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("unsupported TOTP parameter: {0}")]
    UnsupportedParameter(&'static str),
}

/// Which key to generate, with its options.
///
/// An exhaustive match in [`generate`] replaces string routing, so adding
/// a kind without handling it is a compile error.
#[derive(Debug, Clone)]
pub enum KeyKind {
    Ssh {
        hostname: Option<String>,
    },
    Gpg {
        identity: Option<GpgIdentity>,
        service: Option<String>,
    },
    Bitcoin {
        service: Option<String>,
    },
    Ethereum {
        service: Option<String>,
    },
    Totp {
        service: String,
    },
}

/// Output of [`generate`], one variant per kind family.
///
/// `Bitcoin` and `Ethereum` both produce a full [`Wallet`]; the two chains
/// share a mnemonic and differ only in which branch the caller reads.
#[derive(Debug)]
pub enum GeneratedKey {
    Ssh(SshKey),
    Gpg(GpgKey),
    Wallet(Wallet),
    Totp(TotpSecret),
}

/// Generate the key material for `kind` from the master seed.
pub fn generate(seed: &[u8; 64], kind: KeyKind) -> Result<GeneratedKey, KeygenError> {
    match kind {
        KeyKind::Ssh { hostname } => Ok(GeneratedKey::Ssh(ssh::generate(
            seed,
            hostname.as_deref(),
        )?)),
        KeyKind::Gpg { identity, service } => Ok(GeneratedKey::Gpg(gpg::generate(
            seed,
            identity,
            service.as_deref(),
        )?)),
        KeyKind::Bitcoin { service } | KeyKind::Ethereum { service } => Ok(GeneratedKey::Wallet(
            wallet::generate(seed, service.as_deref())?,
        )),
        KeyKind::Totp { service } => Ok(GeneratedKey::Totp(totp::derive_secret(seed, &service)?)),
    }
}
