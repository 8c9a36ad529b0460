//! File persistence for key stores
//!
//! A file-backed key store is a single JSON document:
//!
//! ```text
//! {
//!   "version": 1,
//!   "entries": [ { "alias": "...", "sealed_private_key": { ... }, ... } ],
//!   "integrity": "<hex HMAC-SHA256 of the entries>"
//! }
//! ```
//!
//! When the key store has a password, every private key not already sealed
//! under its entry password is sealed under the key store password, and
//! `integrity` is keyed by it and checked on every read. Without a password,
//! keys without an entry password are written as plain PEM.
//!
//! Writes go to a temporary file in the same directory, created with 0600
//! permissions on Unix, which then replaces the key store file. A failed
//! write leaves the previous file untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, trace};

use super::entry::KeyStoreEntry;
use crate::error::KeyStoreError;

type HmacSha256 = Hmac<Sha256>;

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct KeyStoreDocument {
    version: u32,
    entries: Vec<KeyStoreEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    integrity: Option<String>,
}

fn integrity_mac(
    key_store: &str,
    password: &str,
    entries: &[KeyStoreEntry],
) -> Result<HmacSha256, KeyStoreError> {
    let mut mac = HmacSha256::new_from_slice(password.as_bytes()).map_err(|_| {
        KeyStoreError::IntegrityCheckFailed {
            key_store: key_store.to_string(),
        }
    })?;
    mac.update(&serde_json::to_vec(entries)?);
    Ok(mac)
}

/// Read the entries of a key store file.
///
/// A missing file reads as an empty key store.
pub fn read(
    key_store: &str,
    path: &Path,
    password: Option<&str>,
) -> Result<BTreeMap<String, KeyStoreEntry>, KeyStoreError> {
    if !path.exists() {
        trace!(key_store = %key_store, path = %path.display(), "Key store file not found, starting empty");
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path)?;
    let document: KeyStoreDocument = serde_json::from_str(&content)?;

    if document.version != DOCUMENT_VERSION {
        return Err(KeyStoreError::UnsupportedVersion(document.version));
    }

    if let Some(password) = password {
        let expected = document
            .integrity
            .as_deref()
            .and_then(|hex_mac| hex::decode(hex_mac).ok())
            .ok_or_else(|| KeyStoreError::IntegrityCheckFailed {
                key_store: key_store.to_string(),
            })?;
        integrity_mac(key_store, password, &document.entries)?
            .verify_slice(&expected)
            .map_err(|_| KeyStoreError::IntegrityCheckFailed {
                key_store: key_store.to_string(),
            })?;
    }

    debug!(
        key_store = %key_store,
        path = %path.display(),
        entries = document.entries.len(),
        "Read key store file"
    );

    document
        .entries
        .into_iter()
        .map(|entry| {
            let entry = entry.opened_at_rest(password)?;
            Ok::<_, KeyStoreError>((entry.alias.clone(), entry))
        })
        .collect()
}

/// Write the entries of a key store file, replacing its content
pub fn write(
    key_store: &str,
    path: &Path,
    password: Option<&str>,
    entries: &BTreeMap<String, KeyStoreEntry>,
) -> Result<(), KeyStoreError> {
    let entries = match password {
        Some(password) => entries
            .values()
            .map(|entry| entry.sealed_at_rest(password))
            .collect::<Result<Vec<_>, _>>()?,
        None => entries.values().cloned().collect(),
    };
    let integrity = password
        .map(|password| {
            integrity_mac(key_store, password, &entries)
                .map(|mac| hex::encode(mac.finalize().into_bytes()))
        })
        .transpose()?;

    let document = KeyStoreDocument {
        version: DOCUMENT_VERSION,
        entries,
        integrity,
    };

    let content = serde_json::to_string_pretty(&document)?;
    replace_file(path, |file| file.write_all(content.as_bytes()))?;

    info!(
        key_store = %key_store,
        path = %path.display(),
        entries = document.entries.len(),
        "Stored key store file"
    );
    Ok(())
}

/// Replace `path` with what `write` puts into a fresh owner-only file
fn replace_file(
    path: &Path,
    write: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    write(file.as_file_mut())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    trace!(path = %path.display(), "Replaced key store file");
    Ok(())
}
