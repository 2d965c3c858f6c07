//! Unlocked session holding the master seed
//!
//! A [`Session`] is an explicit value, owned by whichever front-end
//! unlocked it and passed by reference into core operations. The core
//! keeps no global seed cache; when the session drops, the seed is gone.
//! Expiry policy (timeouts, re-prompting) is a front-end concern.

use zeroize::Zeroizing;

use crate::derive::{self, domains};
use crate::master::{self, MASTER_SEED_LEN};
use crate::memory::LockedSeed;
use crate::primitives::CryptoError;

/// Vault encryption key length
pub const VAULT_KEY_LEN: usize = 32;

/// An unlocked Keyforge session.
///
/// The seed lives in a [`LockedSeed`]: pinned into RAM for the session's
/// lifetime and scrubbed when the session drops.
pub struct Session {
    seed: LockedSeed,
}

impl Session {
    /// Run master derivation and open a session.
    ///
    /// Blocks for the full PBKDF2 run (seconds); callers on interactive
    /// paths should show progress or move this to a worker.
    pub fn unlock(passphrase: &str, user_label: &str, version: u32) -> Self {
        let seed = master::derive_master_seed(passphrase, user_label, version);
        Self::from_seed(&seed)
    }

    /// Open a session over an already-derived 64-byte seed.
    ///
    /// The seed is copied into session-owned locked memory; the caller
    /// keeps responsibility for its own copy.
    pub fn from_seed(seed: &[u8; MASTER_SEED_LEN]) -> Self {
        Self {
            seed: LockedSeed::new(seed),
        }
    }

    pub fn seed(&self) -> &[u8; MASTER_SEED_LEN] {
        self.seed.expose()
    }

    /// Derive `len` bytes for `(domain, index)` under this session.
    pub fn derive(
        &self,
        domain: &str,
        index: u32,
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        derive::derive_key(self.seed.expose(), domain, index, len)
    }

    /// The 32-byte vault encryption key for this session.
    pub fn vault_key(&self) -> Result<Zeroizing<[u8; VAULT_KEY_LEN]>, CryptoError> {
        let raw = self.derive(domains::VAULT_ENCRYPT, 0, VAULT_KEY_LEN)?;
        let mut key = Zeroizing::new([0u8; VAULT_KEY_LEN]);
        key.copy_from_slice(&raw);
        Ok(key)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print seed material
        f.debug_struct("Session")
            .field("pinned", &self.seed.is_pinned())
            .finish_non_exhaustive()
    }
}
