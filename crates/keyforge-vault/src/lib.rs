//! Keyforge Vault
//!
//! The on-disk artefact a user must still be able to open years from now
//! with nothing but their passphrase: a single DEFLATE-compressed,
//! ChaCha20-Poly1305-encrypted JSON blob holding passwords, notes, and a
//! record of every public key and address Keyforge has issued.
//!
//! - [`model`]: the record types and the aggregate [`model::Vault`]
//! - [`codec`]: compress, encrypt, and frame the vault for disk
//! - [`store`]: CRUD over records with atomic auto-persistence
//! - [`export`]: the three JSON export containers
//! - [`blobstore`]: the remote-backup interface and the local backend

pub mod blobstore;
pub mod codec;
pub mod export;
pub mod model;
pub mod store;

use keyforge_core::CryptoError;
use thiserror::Error;

pub use blobstore::{Balance, BlobHandle, BlobStore, LocalBlobStore, Quote};
pub use model::Vault;
pub use store::VaultStore;

#[derive(Error, Debug)]
pub enum VaultError {
    /// The container failed authentication or decoding. One kind on
    /// purpose: a flipped ciphertext bit, a truncated file, and a bad
    /// inflate are all the same "this vault is not intact" to callers.
    #[error("vault is corrupt or the key is wrong")]
    Corrupt,
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },
    #[error("password for site already exists: {site}")]
    AlreadyExists { site: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("remote backup failed: {0}")]
    Backup(#[from] blobstore::BlobError),
}
