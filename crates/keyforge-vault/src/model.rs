//! Vault record types and the aggregate
//!
//! Records reference each other by value only; the aggregate owns
//! everything. Passwords live in a map keyed by site so uniqueness is
//! structural, and serialise as a site-ordered sequence so vault files
//! diff cleanly and the checksum is stable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keyforge_core::primitives;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only supported vault format version
pub const VAULT_VERSION: u32 = 1;

/// One previous password, kept when a password changes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordHistoryEntry {
    pub password: String,
    pub changed: DateTime<Utc>,
}

/// A stored site credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordRecord {
    pub id: Uuid,
    pub site: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<PasswordHistoryEntry>,
}

impl PasswordRecord {
    pub fn new(
        site: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            site: site.into(),
            username: username.into(),
            password: password.into(),
            notes: None,
            tags: Vec::new(),
            created: now,
            modified: now,
            history: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Field-wise update for a password record; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct PasswordPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A file attached to a note. `data` is base64 and optional so large
/// attachments can be listed without being inlined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A free-form secure note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl NoteRecord {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            attachments: Vec::new(),
            created: now,
            modified: now,
        }
    }
}

/// Field-wise update for a note
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
}

/// Issued SSH key, public side only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshEntry {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub public_key: String,
    pub fingerprint: String,
    pub created: DateTime<Utc>,
}

/// Issued signing key, public side only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GpgEntry {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub key_id: String,
    pub fingerprint: String,
    pub created: DateTime<Utc>,
}

/// Issued wallet addresses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletEntry {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub bitcoin_address: String,
    pub ethereum_address: String,
    pub xpub: String,
    pub created: DateTime<Utc>,
}

/// Enrolled TOTP service. The secret (base64 of the 20 raw bytes) lives
/// in the vault plaintext; the vault as a whole is encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TotpEntry {
    pub id: Uuid,
    pub service: String,
    pub secret: String,
    pub algorithm: String,
    pub digits: u32,
    pub period: u64,
    pub created: DateTime<Utc>,
}

/// Which keys and addresses have been issued, by kind
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ServicesConfig {
    #[serde(default)]
    pub ssh: Vec<SshEntry>,
    #[serde(default)]
    pub gpg: Vec<GpgEntry>,
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
    #[serde(default)]
    pub totp: Vec<TotpEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VaultConfig {
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Handles of remote backups, one slot per backend
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Backups {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arweave: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nostr: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VaultMetadata {
    /// SHA-256 hex of the canonical vault JSON, recomputed on save
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub backups: Backups,
}

/// The aggregate. Everything Keyforge persists is in here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vault {
    pub version: u32,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub config: VaultConfig,
    #[serde(default, with = "passwords_serde")]
    pub passwords: BTreeMap<String, PasswordRecord>,
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
    #[serde(default)]
    pub metadata: VaultMetadata,
}

impl Vault {
    /// A fresh empty vault, timestamps set to now.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: VAULT_VERSION,
            created: now,
            updated: now,
            config: VaultConfig::default(),
            passwords: BTreeMap::new(),
            notes: Vec::new(),
            metadata: VaultMetadata::default(),
        }
    }

    /// SHA-256 hex over the canonical JSON form with the checksum field
    /// blanked. Canonical means: struct declaration order, passwords as a
    /// site-sorted sequence, no insignificant whitespace. That is exactly
    /// what `serde_json::to_string` emits for this type.
    pub fn calculate_checksum(&self) -> String {
        let mut copy = self.clone();
        copy.metadata.checksum = String::new();
        let canonical =
            serde_json::to_string(&copy).expect("vault has no unserializable fields");
        hex::encode(primitives::sha256(canonical.as_bytes()))
    }

    /// Recompute and store the checksum.
    pub fn refresh_checksum(&mut self) {
        self.metadata.checksum = self.calculate_checksum();
    }

    /// Whether the stored checksum matches the current contents.
    pub fn validate_integrity(&self) -> bool {
        self.metadata.checksum == self.calculate_checksum()
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize the password map as a sequence of records (already
/// site-sorted by the BTreeMap); rebuild the map on load. If a file
/// somehow carries duplicate sites, the later record wins.
mod passwords_serde {
    use super::PasswordRecord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(
        map: &BTreeMap<String, PasswordRecord>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let records: Vec<&PasswordRecord> = map.values().collect();
        records.serialize(serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<String, PasswordRecord>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let records = Vec::<PasswordRecord>::deserialize(deserializer)?;
        Ok(records
            .into_iter()
            .map(|r| (r.site.clone(), r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vault_shape() {
        let vault = Vault::new();
        assert_eq!(vault.version, VAULT_VERSION);
        assert!(vault.passwords.is_empty());
        assert!(vault.notes.is_empty());
        assert_eq!(vault.metadata.checksum, "");
        assert!(vault.updated >= vault.created);
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let mut vault = Vault::new();
        let empty = vault.calculate_checksum();

        let record = PasswordRecord::new("example.com", "alice", "s3cret");
        vault.passwords.insert(record.site.clone(), record);
        assert_ne!(vault.calculate_checksum(), empty);
    }

    #[test]
    fn test_checksum_ignores_stored_checksum() {
        let mut vault = Vault::new();
        let before = vault.calculate_checksum();
        vault.metadata.checksum = before.clone();
        // Computing again with the checksum field populated must blank it
        assert_eq!(vault.calculate_checksum(), before);
    }

    #[test]
    fn test_refresh_and_validate() {
        let mut vault = Vault::new();
        assert!(!vault.validate_integrity()); // empty checksum never matches
        vault.refresh_checksum();
        assert!(vault.validate_integrity());

        vault
            .passwords
            .insert("a".into(), PasswordRecord::new("a", "u", "p"));
        assert!(!vault.validate_integrity());
    }

    #[test]
    fn test_passwords_serialize_as_sorted_sequence() {
        let mut vault = Vault::new();
        for site in ["zeta.org", "alpha.com", "mid.net"] {
            vault
                .passwords
                .insert(site.into(), PasswordRecord::new(site, "u", "p"));
        }

        let json = serde_json::to_value(&vault).unwrap();
        let sites: Vec<&str> = json["passwords"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["site"].as_str().unwrap())
            .collect();
        assert_eq!(sites, vec!["alpha.com", "mid.net", "zeta.org"]);
    }

    #[test]
    fn test_vault_json_roundtrip() {
        let mut vault = Vault::new();
        vault.passwords.insert(
            "example.com".into(),
            PasswordRecord::new("example.com", "alice", "pw").with_tags(vec!["work".into()]),
        );
        vault.notes.push(NoteRecord::new("title", "content"));
        vault.refresh_checksum();

        let json = serde_json::to_string(&vault).unwrap();
        let back: Vault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vault);
        assert!(back.validate_integrity());
    }

    #[test]
    fn test_duplicate_sites_in_file_later_wins() {
        let a = serde_json::to_value(PasswordRecord::new("dup.com", "first", "p1")).unwrap();
        let b = serde_json::to_value(PasswordRecord::new("dup.com", "second", "p2")).unwrap();
        let mut vault_json = serde_json::to_value(Vault::new()).unwrap();
        vault_json["passwords"] = serde_json::Value::Array(vec![a, b]);

        let vault: Vault = serde_json::from_value(vault_json).unwrap();
        assert_eq!(vault.passwords.len(), 1);
        assert_eq!(vault.passwords["dup.com"].username, "second");
    }

    #[test]
    fn test_timestamps_are_rfc3339() {
        let vault = Vault::new();
        let json = serde_json::to_value(&vault).unwrap();
        let created = json["created"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
    }
}
