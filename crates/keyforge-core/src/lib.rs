//! Keyforge Core
//!
//! Deterministic key-material derivation from a single passphrase.
//!
//! # Derivation pipeline
//!
//! ```text
//! passphrase + user label + version
//!     → PBKDF2-HMAC-SHA512 (500 000 iterations)
//!     → 64-byte master seed
//!     → HKDF-style expansion per domain tag and index
//!     → SSH / GPG / wallet / TOTP / vault keys
//! ```
//!
//! Every step is deterministic: the same inputs always produce the same
//! bytes, on every machine. That property is what makes recovery from the
//! passphrase alone possible, and it is why the exact salt format, info
//! strings, and expansion rules in [`master`] and [`derive`] must never
//! change.
//!
//! # Secret hygiene
//!
//! Master seeds live in [`Session`] values that mlock their backing memory
//! (best-effort) and scrub it on drop. See [`memory`] for the process-level
//! hardening helpers.

pub mod derive;
pub mod master;
pub mod memory;
pub mod passphrase;
pub mod primitives;
pub mod session;

pub use derive::{derive_key, derive_multiple, domains, hostname_to_index, service_to_index};
pub use master::{derive_master_seed, DEFAULT_USER_LABEL, DEFAULT_VERSION, MASTER_SEED_LEN};
pub use primitives::CryptoError;
pub use session::Session;
