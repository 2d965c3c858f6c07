//! Export containers: plain JSON, encrypted, and full backup
//!
//! Three UTF-8 JSON shapes, distinguished on import by the top-level
//! `format` field (absent means plain `json`). The encrypted variants
//! reuse the vault pipeline (DEFLATE then ChaCha20-Poly1305 under the
//! session's vault key) with the nonce, tag, and ciphertext carried as
//! base64 fields instead of the binary envelope.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use keyforge_core::primitives::{self, NONCE_LEN, TAG_LEN};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::codec;
use crate::model::Vault;
use crate::VaultError;

/// Version stamped into every container
pub const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Plaintext vault JSON; for inspection and migration, not backup
    Json,
    /// Encrypted payload, minimal metadata
    Encrypted,
    /// Encrypted payload plus record counts, for long-term backup
    Backup,
}

impl ExportFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Encrypted => "encrypted",
            Self::Backup => "backup",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportInfo {
    version: String,
    exported: DateTime<Utc>,
    format: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonContainer {
    #[serde(rename = "exportInfo")]
    export_info: ExportInfo,
    vault: Vault,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptedContainer {
    version: String,
    format: String,
    exported: DateTime<Utc>,
    nonce: String,
    tag: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupContainer {
    format: String,
    version: String,
    exported: DateTime<Utc>,
    encryption: String,
    nonce: String,
    tag: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupPayload {
    vault: Vault,
    metadata: BackupMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupMetadata {
    exported: DateTime<Utc>,
    passwords: usize,
    notes: usize,
}

/// Serialize a vault into the chosen container.
pub fn export(vault: &Vault, key: &[u8; 32], format: ExportFormat) -> Result<String, VaultError> {
    let exported = Utc::now();
    let container = match format {
        ExportFormat::Json => serde_json::to_string_pretty(&JsonContainer {
            export_info: ExportInfo {
                version: EXPORT_VERSION.to_string(),
                exported,
                format: "json".to_string(),
            },
            vault: vault.clone(),
        }),
        ExportFormat::Encrypted => {
            let json = serde_json::to_vec(vault).expect("vault has no unserializable fields");
            let (nonce, tag, data) = seal(&json, key)?;
            serde_json::to_string_pretty(&EncryptedContainer {
                version: EXPORT_VERSION.to_string(),
                format: "encrypted".to_string(),
                exported,
                nonce,
                tag,
                data,
            })
        }
        ExportFormat::Backup => {
            let payload = BackupPayload {
                vault: vault.clone(),
                metadata: BackupMetadata {
                    exported,
                    passwords: vault.passwords.len(),
                    notes: vault.notes.len(),
                },
            };
            let json = serde_json::to_vec(&payload).expect("payload has no unserializable fields");
            let (nonce, tag, data) = seal(&json, key)?;
            serde_json::to_string_pretty(&BackupContainer {
                format: "keyforge-backup".to_string(),
                version: EXPORT_VERSION.to_string(),
                exported,
                encryption: "ChaCha20-Poly1305".to_string(),
                nonce,
                tag,
                data,
            })
        }
    };
    container.map_err(|e| VaultError::InvalidFormat(e.to_string()))
}

/// Parse any of the three containers back into a vault.
///
/// Unknown `format` values are [`VaultError::InvalidFormat`]; decryption
/// or payload failures inside a recognised container are
/// [`VaultError::Corrupt`].
pub fn import(data: &str, key: &[u8; 32]) -> Result<Vault, VaultError> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| VaultError::InvalidFormat(e.to_string()))?;

    let format = value
        .get("format")
        .and_then(|f| f.as_str())
        .unwrap_or("json");

    match format {
        "json" => {
            let container: JsonContainer =
                serde_json::from_value(value).map_err(|_| VaultError::Corrupt)?;
            Ok(container.vault)
        }
        "encrypted" => {
            let container: EncryptedContainer =
                serde_json::from_value(value).map_err(|_| VaultError::Corrupt)?;
            let json = open(&container.nonce, &container.tag, &container.data, key)?;
            serde_json::from_slice(&json).map_err(|_| VaultError::Corrupt)
        }
        "keyforge-backup" => {
            let container: BackupContainer =
                serde_json::from_value(value).map_err(|_| VaultError::Corrupt)?;
            let json = open(&container.nonce, &container.tag, &container.data, key)?;
            let payload: BackupPayload =
                serde_json::from_slice(&json).map_err(|_| VaultError::Corrupt)?;
            Ok(payload.vault)
        }
        other => Err(VaultError::InvalidFormat(format!(
            "unknown export format: {other}"
        ))),
    }
}

fn seal(plaintext: &[u8], key: &[u8; 32]) -> Result<(String, String, String), VaultError> {
    let compressed = Zeroizing::new(codec::deflate(plaintext)?);
    let nonce_bytes = primitives::random(NONCE_LEN);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_bytes);
    let (ciphertext, tag) = primitives::chacha20poly1305_seal(key, &nonce, &compressed)?;
    Ok((
        STANDARD.encode(nonce),
        STANDARD.encode(tag),
        STANDARD.encode(ciphertext),
    ))
}

fn open(nonce: &str, tag: &str, data: &str, key: &[u8; 32]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let nonce_bytes = STANDARD.decode(nonce).map_err(|_| VaultError::Corrupt)?;
    let tag_bytes = STANDARD.decode(tag).map_err(|_| VaultError::Corrupt)?;
    let ciphertext = STANDARD.decode(data).map_err(|_| VaultError::Corrupt)?;

    let nonce: [u8; NONCE_LEN] = nonce_bytes.try_into().map_err(|_| VaultError::Corrupt)?;
    let tag: [u8; TAG_LEN] = tag_bytes.try_into().map_err(|_| VaultError::Corrupt)?;

    let compressed = primitives::chacha20poly1305_open(key, &nonce, &ciphertext, &tag)
        .map_err(|_| VaultError::Corrupt)?;
    Ok(Zeroizing::new(
        codec::inflate(&compressed).map_err(|_| VaultError::Corrupt)?,
    ))
}
