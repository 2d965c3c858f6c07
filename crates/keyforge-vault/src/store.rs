//! Vault store: record CRUD with atomic auto-persistence
//!
//! One store instance owns one vault. `&mut self` on every mutating
//! operation is the per-vault critical section: callers that want
//! concurrent mutation wrap the store in their own lock, and sequential
//! operations leave the on-disk file reflecting exactly the operations
//! applied so far. Saves go through a temp file, fsync, and an atomic
//! rename, so a crashed or cancelled save leaves the previous vault
//! intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use keyforge_core::Session;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::blobstore::{BlobHandle, BlobStore};
use crate::codec::{self, Envelope};
use crate::model::{
    GpgEntry, NotePatch, NoteRecord, PasswordHistoryEntry, PasswordPatch, PasswordRecord,
    SshEntry, TotpEntry, Vault, WalletEntry,
};
use crate::VaultError;

/// Vault file name inside the config directory
const VAULT_FILE: &str = "vault.enc";

/// Search filter for passwords; empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct PasswordQuery {
    /// Case-insensitive substring of the site
    pub site: Option<String>,
    /// Case-insensitive substring of the username
    pub username: Option<String>,
    /// Record must carry every listed tag
    pub tags: Vec<String>,
}

pub struct VaultStore {
    vault: Vault,
    path: PathBuf,
    key: Zeroizing<[u8; 32]>,
}

impl VaultStore {
    /// Open the vault at the default path for this session.
    pub fn open(session: &Session) -> Result<Self, VaultError> {
        Self::open_at(session, Self::default_path())
    }

    /// Open a vault at an explicit path (tests, alternate profiles).
    ///
    /// Construction never fails on vault-file problems: a missing,
    /// unreadable, or corrupt file yields an empty vault, because a first
    /// run and a lost file look identical here and the user's recourse
    /// (re-issue or restore from backup) is the same.
    pub fn open_at(session: &Session, path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let mut store = Self {
            vault: Vault::new(),
            path: path.into(),
            key: session.vault_key()?,
        };
        store.load();
        Ok(store)
    }

    /// `$KEYFORGE_CONFIG_DIR/vault.enc`, or `$HOME/.keyforge/vault.enc`.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join(VAULT_FILE)
    }

    /// Configuration directory honouring `KEYFORGE_CONFIG_DIR`.
    pub fn config_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("KEYFORGE_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".keyforge")
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---- passwords ----

    /// Add a password record. The site must not already exist.
    pub fn add_password(&mut self, record: PasswordRecord) -> Result<(), VaultError> {
        self.mutate(|vault| {
            if vault.passwords.contains_key(&record.site) {
                return Err(VaultError::AlreadyExists { site: record.site });
            }
            vault.passwords.insert(record.site.clone(), record);
            Ok(())
        })
    }

    pub fn get_password(&self, site: &str) -> Option<&PasswordRecord> {
        self.vault.passwords.get(site)
    }

    /// All passwords, site-sorted.
    pub fn list_passwords(&self) -> Vec<&PasswordRecord> {
        self.vault.passwords.values().collect()
    }

    /// Apply a patch to the record for `site`. When the patch changes the
    /// password field, the previous password is prepended to the history.
    pub fn update_password(&mut self, site: &str, patch: PasswordPatch) -> Result<(), VaultError> {
        self.mutate(|vault| {
            let record = vault
                .passwords
                .get_mut(site)
                .ok_or_else(|| not_found("password", site))?;
            let now = Utc::now();

            if let Some(username) = patch.username {
                record.username = username;
            }
            if let Some(password) = patch.password {
                if password != record.password {
                    let previous = std::mem::replace(&mut record.password, password);
                    record.history.insert(
                        0,
                        PasswordHistoryEntry {
                            password: previous,
                            changed: now,
                        },
                    );
                }
            }
            if let Some(notes) = patch.notes {
                record.notes = Some(notes);
            }
            if let Some(tags) = patch.tags {
                record.tags = tags;
            }
            record.modified = now;
            Ok(())
        })
    }

    pub fn delete_password(&mut self, site: &str) -> Result<(), VaultError> {
        self.mutate(|vault| {
            vault
                .passwords
                .remove(site)
                .map(|_| ())
                .ok_or_else(|| not_found("password", site))
        })
    }

    /// Filter passwords; every populated field must match.
    pub fn search_passwords(&self, query: &PasswordQuery) -> Vec<&PasswordRecord> {
        let site = query.site.as_deref().map(str::to_lowercase);
        let username = query.username.as_deref().map(str::to_lowercase);
        self.vault
            .passwords
            .values()
            .filter(|r| {
                site.as_deref()
                    .is_none_or(|s| r.site.to_lowercase().contains(s))
            })
            .filter(|r| {
                username
                    .as_deref()
                    .is_none_or(|u| r.username.to_lowercase().contains(u))
            })
            .filter(|r| query.tags.iter().all(|t| r.tags.contains(t)))
            .collect()
    }

    // ---- notes ----

    pub fn add_note(&mut self, note: NoteRecord) -> Result<Uuid, VaultError> {
        let id = note.id;
        self.mutate(|vault| {
            vault.notes.push(note);
            Ok(())
        })?;
        Ok(id)
    }

    pub fn get_note(&self, id: &Uuid) -> Option<&NoteRecord> {
        self.vault.notes.iter().find(|n| &n.id == id)
    }

    pub fn list_notes(&self) -> &[NoteRecord] {
        &self.vault.notes
    }

    pub fn update_note(&mut self, id: &Uuid, patch: NotePatch) -> Result<(), VaultError> {
        self.mutate(|vault| {
            let note = vault
                .notes
                .iter_mut()
                .find(|n| &n.id == id)
                .ok_or_else(|| not_found("note", &id.to_string()))?;
            if let Some(title) = patch.title {
                note.title = title;
            }
            if let Some(content) = patch.content {
                note.content = content;
            }
            if let Some(attachments) = patch.attachments {
                note.attachments = attachments;
            }
            note.modified = Utc::now();
            Ok(())
        })
    }

    pub fn delete_note(&mut self, id: &Uuid) -> Result<(), VaultError> {
        self.mutate(|vault| {
            let position = vault
                .notes
                .iter()
                .position(|n| &n.id == id)
                .ok_or_else(|| not_found("note", &id.to_string()))?;
            vault.notes.remove(position);
            Ok(())
        })
    }

    // ---- service config ----

    pub fn add_ssh_entry(&mut self, entry: SshEntry) -> Result<(), VaultError> {
        self.mutate(|vault| {
            vault.config.services.ssh.push(entry);
            Ok(())
        })
    }

    pub fn add_gpg_entry(&mut self, entry: GpgEntry) -> Result<(), VaultError> {
        self.mutate(|vault| {
            vault.config.services.gpg.push(entry);
            Ok(())
        })
    }

    pub fn add_wallet_entry(&mut self, entry: WalletEntry) -> Result<(), VaultError> {
        self.mutate(|vault| {
            vault.config.services.wallets.push(entry);
            Ok(())
        })
    }

    pub fn add_totp_entry(&mut self, entry: TotpEntry) -> Result<(), VaultError> {
        self.mutate(|vault| {
            vault.config.services.totp.push(entry);
            Ok(())
        })
    }

    pub fn ssh_entries(&self) -> &[SshEntry] {
        &self.vault.config.services.ssh
    }

    pub fn gpg_entries(&self) -> &[GpgEntry] {
        &self.vault.config.services.gpg
    }

    pub fn wallet_entries(&self) -> &[WalletEntry] {
        &self.vault.config.services.wallets
    }

    pub fn totp_entries(&self) -> &[TotpEntry] {
        &self.vault.config.services.totp
    }

    // ---- persistence ----

    /// Encrypt and write the vault: checksum refresh, temp file, fsync,
    /// atomic rename. A leftover temp file from an interrupted save is
    /// simply overwritten here.
    pub fn save(&mut self) -> Result<(), VaultError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.vault.refresh_checksum();

        let envelope = codec::encrypt(&self.vault, &self.key)?;
        let tmp = self.path.with_extension("enc.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&envelope.to_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        log::debug!("vault saved to {}", self.path.display());
        Ok(())
    }

    /// Read and decrypt the vault file, replacing the in-memory vault.
    /// On any failure the store falls back to an empty vault; returns
    /// whether an existing vault was loaded.
    pub fn load(&mut self) -> bool {
        match self.try_load() {
            Ok(vault) => {
                self.vault = vault;
                true
            }
            Err(e) => {
                log::debug!(
                    "no usable vault at {} ({}); starting empty",
                    self.path.display(),
                    e
                );
                self.vault = Vault::new();
                false
            }
        }
    }

    fn try_load(&self) -> Result<Vault, VaultError> {
        let bytes = fs::read(&self.path)?;
        let envelope = Envelope::from_bytes(&bytes)?;
        codec::decrypt(&envelope, &self.key)
    }

    /// Replace the vault with a fresh empty one and persist it.
    pub fn clear(&mut self) -> Result<(), VaultError> {
        self.vault = Vault::new();
        self.save()
    }

    /// Replace the record set wholesale (import); persists once.
    pub fn replace_vault(&mut self, vault: Vault) -> Result<(), VaultError> {
        let previous = std::mem::replace(&mut self.vault, vault);
        self.vault.updated = Utc::now();
        if let Err(e) = self.save() {
            self.vault = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Persist locally, then push the saved envelope to `remote` if one
    /// is given. The local save always happens first; a remote failure
    /// surfaces as an error after the vault is already safe on disk.
    pub fn sync(
        &mut self,
        remote: Option<&mut dyn BlobStore>,
    ) -> Result<Option<BlobHandle>, VaultError> {
        self.vault.updated = Utc::now();
        self.save()?;

        let Some(remote) = remote else {
            return Ok(None);
        };

        let bytes = fs::read(&self.path)?;
        let handle = remote.put(&bytes)?;
        let backups = &mut self.vault.metadata.backups;
        match remote.label() {
            "arweave" => backups.arweave = Some(handle.0.clone()),
            "nostr" => backups.nostr.get_or_insert_with(Vec::new).push(handle.0.clone()),
            "ipfs" => backups.ipfs = Some(handle.0.clone()),
            _ => backups.local = Some(handle.0.clone()),
        }
        // Record the handle; the vault on disk now trails by one field,
        // which the next save closes. Failing here still surfaces.
        self.save()?;
        Ok(Some(handle))
    }

    /// Whether the stored checksum matches the current contents.
    pub fn validate_integrity(&self) -> bool {
        self.vault.validate_integrity()
    }

    pub fn calculate_checksum(&self) -> String {
        self.vault.calculate_checksum()
    }

    /// Run a mutation, stamp `updated`, and persist. If persisting fails
    /// the in-memory vault is rolled back, so no mutation is ever half
    /// committed.
    fn mutate<F>(&mut self, op: F) -> Result<(), VaultError>
    where
        F: FnOnce(&mut Vault) -> Result<(), VaultError>,
    {
        let snapshot = self.vault.clone();
        let result = op(&mut self.vault).and_then(|_| {
            self.vault.updated = Utc::now();
            self.save()
        });
        if let Err(e) = result {
            self.vault = snapshot;
            return Err(e);
        }
        Ok(())
    }
}

fn not_found(what: &'static str, key: &str) -> VaultError {
    VaultError::NotFound {
        what,
        key: key.to_string(),
    }
}
