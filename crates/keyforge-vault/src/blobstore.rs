//! Remote backup interface
//!
//! A `BlobStore` accepts the exact vault envelope bytes from [`crate::codec`]
//! and returns them unchanged; `get(latest())` is always the most recent
//! `put`. Network backends (Arweave, Nostr, IPFS) live outside this crate
//! behind this trait; the directory-backed [`LocalBlobStore`] ships here
//! as the reference implementation and test double.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque handle to a stored blob: a transaction id, an event id, or a
/// file name, whatever the backend uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle(pub String);

/// Price estimate for storing a payload
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub size: u64,
    pub price_minor_units: u64,
    pub currency: String,
    pub fx_rate: f64,
}

/// Funds available to the backend's payment wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub total: u64,
}

pub trait BlobStore {
    /// Short backend name used as the backup-slot key in vault metadata
    /// ("local", "arweave", "nostr", "ipfs").
    fn label(&self) -> &'static str;

    /// Store a payload and return its handle.
    fn put(&mut self, bytes: &[u8]) -> Result<BlobHandle, BlobError>;

    /// Fetch a previously stored payload.
    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>, BlobError>;

    /// Handle of the most recent `put`, if any.
    fn latest(&self) -> Result<Option<BlobHandle>, BlobError>;

    /// Price a payload without storing it.
    fn quote(&self, bytes: &[u8]) -> Result<Quote, BlobError>;

    /// Funds available for `put`.
    fn balance(&self) -> Result<Balance, BlobError>;
}

/// Directory-of-files backend. Blobs are numbered so `latest` is the
/// highest sequence number; storage is free.
#[derive(Debug)]
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn sequence_numbers(&self) -> Result<Vec<u64>, BlobError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut numbers = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(seq) = name
                .strip_prefix("blob-")
                .and_then(|n| n.strip_suffix(".bin"))
                .and_then(|n| n.parse::<u64>().ok())
            {
                numbers.push(seq);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn handle_for(seq: u64) -> BlobHandle {
        BlobHandle(format!("blob-{seq:08}.bin"))
    }
}

impl BlobStore for LocalBlobStore {
    fn label(&self) -> &'static str {
        "local"
    }

    fn put(&mut self, bytes: &[u8]) -> Result<BlobHandle, BlobError> {
        fs::create_dir_all(&self.dir)?;
        let next = self.sequence_numbers()?.last().map_or(0, |s| s + 1);
        let handle = Self::handle_for(next);
        fs::write(self.dir.join(&handle.0), bytes)?;
        Ok(handle)
    }

    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>, BlobError> {
        let path = self.dir.join(&handle.0);
        if !path.exists() {
            return Err(BlobError::NotFound(handle.0.clone()));
        }
        Ok(fs::read(path)?)
    }

    fn latest(&self) -> Result<Option<BlobHandle>, BlobError> {
        Ok(self.sequence_numbers()?.last().map(|&s| Self::handle_for(s)))
    }

    fn quote(&self, bytes: &[u8]) -> Result<Quote, BlobError> {
        Ok(Quote {
            size: bytes.len() as u64,
            price_minor_units: 0,
            currency: "USD".to_string(),
            fx_rate: 1.0,
        })
    }

    fn balance(&self) -> Result<Balance, BlobError> {
        // Local storage needs no funds
        Ok(Balance {
            confirmed: 0,
            unconfirmed: 0,
            total: 0,
        })
    }
}
