//! Command handlers: each one opens the store, does its work through the
//! library crates, and prints.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use keyforge_core::Session;
use keyforge_keys::{totp, GeneratedKey, GpgIdentity, KeyKind, TotpSecret};
use keyforge_vault::export::{self, ExportFormat};
use keyforge_vault::model::{
    GpgEntry, PasswordPatch, PasswordRecord, SshEntry, TotpEntry, WalletEntry,
};
use keyforge_vault::{LocalBlobStore, VaultStore};
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::{GenerateKind, PassAction, VaultAction};

pub fn init(session: &Session) -> Result<()> {
    let mut store = VaultStore::open(session)?;
    store.save().context("failed to write the vault")?;
    println!("Vault ready at {}", store.path().display());
    status(&store);
    Ok(())
}

pub fn generate(session: &Session, kind: GenerateKind) -> Result<()> {
    let mut store = VaultStore::open(session)?;

    let wallet_service = match &kind {
        GenerateKind::Bitcoin { service } | GenerateKind::Ethereum { service } => service.clone(),
        _ => None,
    };
    let key_kind = match kind {
        GenerateKind::Ssh { hostname } => KeyKind::Ssh { hostname },
        GenerateKind::Gpg {
            name,
            email,
            comment,
            service,
        } => {
            let identity = match (name, email) {
                (None, None) if comment.is_none() => None,
                (name, email) => Some(GpgIdentity::new(
                    name.unwrap_or_else(|| "Keyforge User".into()),
                    email.unwrap_or_else(|| "user@keyforge.local".into()),
                    comment,
                )?),
            };
            KeyKind::Gpg { identity, service }
        }
        GenerateKind::Bitcoin { service } => KeyKind::Bitcoin { service },
        GenerateKind::Ethereum { service } => KeyKind::Ethereum { service },
        GenerateKind::Totp { service } => KeyKind::Totp { service },
    };

    match keyforge_keys::generate(session.seed(), key_kind)? {
        GeneratedKey::Ssh(key) => {
            store.add_ssh_entry(SshEntry {
                id: Uuid::new_v4(),
                hostname: key
                    .comment
                    .strip_prefix("keyforge@")
                    .map(|h| h.to_string()),
                public_key: key.public_key.clone(),
                fingerprint: key.fingerprint.clone(),
                created: Utc::now(),
            })?;
            println!("{}", key.public_key);
            println!("{}", key.fingerprint);
            print!("{}", key.private_key);
        }
        GeneratedKey::Gpg(key) => {
            store.add_gpg_entry(GpgEntry {
                id: Uuid::new_v4(),
                name: key.identity.name.clone(),
                email: key.identity.email.clone(),
                key_id: key.key_id.clone(),
                fingerprint: key.fingerprint.clone(),
                created: Utc::now(),
            })?;
            println!("key id:      {}", key.key_id);
            println!("fingerprint: {}", key.fingerprint);
            print!("{}", key.public_armor);
            print!("{}", key.private_armor);
        }
        GeneratedKey::Wallet(wallet) => {
            store.add_wallet_entry(WalletEntry {
                id: Uuid::new_v4(),
                service: wallet_service,
                bitcoin_address: wallet.bitcoin.address.clone(),
                ethereum_address: wallet.ethereum.address.clone(),
                xpub: wallet.bitcoin.xpub.clone(),
                created: Utc::now(),
            })?;
            println!("mnemonic:  {}", wallet.mnemonic);
            println!("bitcoin:   {}  ({})", wallet.bitcoin.address, wallet.bitcoin.derivation_path);
            println!("xpub:      {}", wallet.bitcoin.xpub);
            println!("ethereum:  {}  ({})", wallet.ethereum.address, wallet.ethereum.derivation_path);
        }
        GeneratedKey::Totp(secret) => {
            enrol_totp(&mut store, &secret)?;
            println!("secret: {}", secret.base32());
            println!("uri:    {}", secret.otpauth_uri());
        }
    }
    Ok(())
}

pub fn vault(session: &Session, action: VaultAction) -> Result<()> {
    let mut store = VaultStore::open(session)?;
    match action {
        VaultAction::Status => status(&store),
        VaultAction::Sync => {
            let backup_dir = VaultStore::config_dir().join("backups");
            let mut remote = LocalBlobStore::new(backup_dir);
            let handle = store.sync(Some(&mut remote))?;
            match handle {
                Some(handle) => println!("Synced; backup {}", handle.0),
                None => println!("Synced"),
            }
        }
        VaultAction::List => {
            for entry in store.ssh_entries() {
                println!(
                    "ssh      {:24} {}",
                    entry.hostname.as_deref().unwrap_or("(default)"),
                    entry.fingerprint
                );
            }
            for entry in store.gpg_entries() {
                println!("gpg      {:24} {}", entry.email, entry.key_id);
            }
            for entry in store.wallet_entries() {
                println!(
                    "wallet   {:24} {} {}",
                    entry.service.as_deref().unwrap_or("(default)"),
                    entry.bitcoin_address,
                    entry.ethereum_address
                );
            }
            for entry in store.totp_entries() {
                println!("totp     {:24} {}/{} digits", entry.service, entry.algorithm, entry.digits);
            }
        }
    }
    Ok(())
}

pub fn pass(session: &Session, action: PassAction) -> Result<()> {
    let mut store = VaultStore::open(session)?;
    match action {
        PassAction::Add {
            site,
            username,
            notes,
            tags,
        } => {
            let password = rpassword::prompt_password(format!("Password for {site}: "))?;
            let mut record = PasswordRecord::new(&site, username, password);
            if let Some(notes) = notes {
                record = record.with_notes(notes);
            }
            if let Some(tags) = tags {
                record = record.with_tags(split_tags(&tags));
            }
            store.add_password(record)?;
            println!("Added {site}");
        }
        PassAction::Get { site } => {
            let record = store
                .get_password(&site)
                .with_context(|| format!("no password for {site}"))?;
            println!("site:     {}", record.site);
            println!("username: {}", record.username);
            println!("password: {}", record.password);
            if let Some(notes) = &record.notes {
                println!("notes:    {notes}");
            }
            if !record.tags.is_empty() {
                println!("tags:     {}", record.tags.join(", "));
            }
        }
        PassAction::List => {
            for record in store.list_passwords() {
                println!("{:32} {}", record.site, record.username);
            }
        }
        PassAction::Update {
            site,
            username,
            password,
            notes,
            tags,
        } => {
            let password = if password {
                Some(rpassword::prompt_password(format!(
                    "New password for {site}: "
                ))?)
            } else {
                None
            };
            store.update_password(
                &site,
                PasswordPatch {
                    username,
                    password,
                    notes,
                    tags: tags.map(|t| split_tags(&t)),
                },
            )?;
            println!("Updated {site}");
        }
        PassAction::Delete { site } => {
            store.delete_password(&site)?;
            println!("Deleted {site}");
        }
        PassAction::Generate { .. } => unreachable!("handled before unlock"),
    }
    Ok(())
}

/// Random password from a mixed charset; no vault, no session.
pub fn pass_generate(length: usize) -> Result<()> {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*-_=+";
    let mut rng = rand::thread_rng();
    let password: String = (0..length)
        .map(|_| *CHARSET.choose(&mut rng).expect("charset is non-empty") as char)
        .collect();
    println!("{password}");
    Ok(())
}

pub fn totp(session: &Session, service: &str) -> Result<()> {
    let mut store = VaultStore::open(session)?;
    let secret = totp::derive_secret(session.seed(), service)?;

    // Enrol on first use so `vault list` shows the service
    if enrol_totp(&mut store, &secret)? {
        println!("secret: {}", secret.base32());
        println!("uri:    {}", secret.otpauth_uri());
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the epoch")?
        .as_secs();
    let code = totp::code_default(secret.bytes(), now)?;
    println!("{}", totp::display(&code));
    Ok(())
}

pub fn export(session: &Session, format: &str, output: Option<PathBuf>) -> Result<()> {
    let store = VaultStore::open(session)?;
    let format = match format {
        "json" => ExportFormat::Json,
        "encrypted" => ExportFormat::Encrypted,
        "backup" => ExportFormat::Backup,
        other => anyhow::bail!("unknown export format: {other} (json|encrypted|backup)"),
    };

    let key = session.vault_key()?;
    let container = export::export(store.vault(), &key, format)?;
    match output {
        Some(path) => {
            std::fs::write(&path, container)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{container}"),
    }
    Ok(())
}

pub fn import(session: &Session, file: &Path) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let key = session.vault_key()?;
    let vault = export::import(&data, &key)?;

    let mut store = VaultStore::open(session)?;
    let passwords = vault.passwords.len();
    let notes = vault.notes.len();
    store.replace_vault(vault)?;
    println!("Imported {passwords} passwords and {notes} notes");
    Ok(())
}

fn status(store: &VaultStore) {
    let vault = store.vault();
    println!("path:       {}", store.path().display());
    println!("passwords:  {}", vault.passwords.len());
    println!("notes:      {}", vault.notes.len());
    println!(
        "services:   {} ssh, {} gpg, {} wallets, {} totp",
        vault.config.services.ssh.len(),
        vault.config.services.gpg.len(),
        vault.config.services.wallets.len(),
        vault.config.services.totp.len()
    );
    println!("updated:    {}", vault.updated.to_rfc3339());
    println!(
        "integrity:  {}",
        if store.validate_integrity() {
            "ok"
        } else {
            "UNVERIFIED (vault not yet saved)"
        }
    );
}

/// Record a TOTP service in the vault config on first sight. Returns
/// whether a new entry was written.
fn enrol_totp(store: &mut VaultStore, secret: &TotpSecret) -> Result<bool> {
    if store
        .totp_entries()
        .iter()
        .any(|e| e.service == secret.service)
    {
        return Ok(false);
    }
    store.add_totp_entry(TotpEntry {
        id: Uuid::new_v4(),
        service: secret.service.clone(),
        secret: STANDARD.encode(secret.bytes()),
        algorithm: "SHA1".into(),
        digits: 6,
        period: 30,
        created: Utc::now(),
    })?;
    Ok(true)
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
