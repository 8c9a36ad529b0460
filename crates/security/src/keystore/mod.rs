//! Key store adapter
//!
//! A [`KeyStoreService`] is the live value of a `key-store` resource. It keeps
//! entries in memory and persists them on [`KeyStoreService::store`]. A key
//! store with a path is file-backed; one without a path is fileless and keeps
//! its entries in memory only, so `store` has nothing to write.
//!
//! Private keys never reach disk in the clear when either password is set:
//! an entry password seals the key when the entry is created, and the key
//! store password seals every remaining key when the file is written.

mod entry;
mod resource;
mod sealed;
pub(crate) mod storage;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::error::KeyStoreError;

pub use entry::{
    certificate_fingerprint, AliasInfo, CertificateDetails, CertificateInfo, EntryType, KeyMaterial,
    KeyStoreEntry,
};
pub use resource::KeyStoreResource;
pub use sealed::{SealedBy, SealedKey};

/// Where a key store's entries live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreBacking {
    File(PathBuf),
    Fileless { store_type: String },
}

/// State captured by [`KeyStoreService::load`], restored by
/// [`KeyStoreService::revert_load`].
#[derive(Debug)]
pub struct RevertToken {
    previous: BTreeMap<String, KeyStoreEntry>,
}

/// Live key store.
pub struct KeyStoreService {
    name: String,
    backing: KeyStoreBacking,
    password: Option<String>,
    entries: RwLock<BTreeMap<String, KeyStoreEntry>>,
}

impl KeyStoreService {
    pub fn new(name: &str, backing: KeyStoreBacking, password: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            backing,
            password,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backing(&self) -> &KeyStoreBacking {
        &self.backing
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            KeyStoreBacking::File(path) => Some(path),
            KeyStoreBacking::Fileless { .. } => None,
        }
    }

    /// (Re)load entries from the backing store.
    ///
    /// Returns a token holding the previous in-memory entries. A fileless
    /// key store keeps its current entries.
    pub fn load(&self) -> Result<RevertToken, KeyStoreError> {
        let loaded = match &self.backing {
            KeyStoreBacking::File(path) => {
                Some(storage::read(&self.name, path, self.password.as_deref())?)
            }
            KeyStoreBacking::Fileless { store_type } => {
                trace!(key_store = %self.name, store_type = %store_type, "Fileless key store, nothing to read");
                None
            }
        };

        let mut entries = self.entries.write();
        let previous = match loaded {
            Some(loaded) => std::mem::replace(&mut *entries, loaded),
            None => entries.clone(),
        };

        debug!(key_store = %self.name, entries = entries.len(), "Loaded key store");
        Ok(RevertToken { previous })
    }

    /// Restore the entries captured by `load`
    pub fn revert_load(&self, token: RevertToken) {
        let mut entries = self.entries.write();
        *entries = token.previous;
        debug!(key_store = %self.name, entries = entries.len(), "Reverted key store load");
    }

    /// Persist the current entries to the backing store
    pub fn store(&self) -> Result<(), KeyStoreError> {
        match &self.backing {
            KeyStoreBacking::File(path) => {
                let entries = self.entries.read();
                storage::write(&self.name, path, self.password.as_deref(), &entries)
            }
            KeyStoreBacking::Fileless { .. } => {
                trace!(key_store = %self.name, "Fileless key store, nothing to store");
                Ok(())
            }
        }
    }

    pub fn aliases(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.read().contains_key(alias)
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    pub fn entry(&self, alias: &str) -> Option<KeyStoreEntry> {
        self.entries.read().get(alias).cloned()
    }

    /// Insert or replace the entry at its alias
    pub fn set_entry(&self, entry: KeyStoreEntry) {
        trace!(key_store = %self.name, alias = %entry.alias, "Setting key store entry");
        self.entries.write().insert(entry.alias.clone(), entry);
    }

    fn alias_not_found(&self, alias: &str) -> KeyStoreError {
        KeyStoreError::AliasNotFound {
            key_store: self.name.clone(),
            alias: alias.to_string(),
        }
    }

    /// Key material stored under `alias`
    pub fn private_key(
        &self,
        alias: &str,
        password: Option<&str>,
    ) -> Result<KeyMaterial, KeyStoreError> {
        self.entries
            .read()
            .get(alias)
            .ok_or_else(|| self.alias_not_found(alias))?
            .key_material(password)
    }

    /// Describe one alias
    pub fn read_alias(&self, alias: &str, verbose: bool) -> Result<AliasInfo, KeyStoreError> {
        self.entries
            .read()
            .get(alias)
            .ok_or_else(|| self.alias_not_found(alias))?
            .describe(verbose)
    }

    /// Describe every alias when `recursive`, otherwise list alias names only
    pub fn read_all_aliases(&self, recursive: bool, verbose: bool) -> Result<AliasListing, KeyStoreError> {
        let entries = self.entries.read();
        if !recursive {
            return Ok(AliasListing::Names(entries.keys().cloned().collect()));
        }

        entries
            .values()
            .map(|entry| entry.describe(verbose))
            .collect::<Result<Vec<_>, _>>()
            .map(AliasListing::Details)
    }

    /// Remove an alias from the in-memory entries.
    ///
    /// Takes effect immediately; call [`store`](Self::store) to persist it.
    pub fn remove_alias(&self, alias: &str) -> Result<KeyStoreEntry, KeyStoreError> {
        match self.entries.write().remove(alias) {
            Some(entry) => {
                info!(key_store = %self.name, alias = %alias, "Removed alias");
                Ok(entry)
            }
            None => {
                warn!(key_store = %self.name, alias = %alias, "Alias to remove does not exist");
                Err(self.alias_not_found(alias))
            }
        }
    }

    /// Generate a key pair with a self-signed certificate under `alias`
    pub fn generate_key_pair(
        &self,
        alias: &str,
        common_name: &str,
        password: Option<&str>,
    ) -> Result<KeyMaterial, KeyStoreError> {
        let material = KeyMaterial::generate(common_name)?;
        self.set_entry(KeyStoreEntry::private_key(alias, material.clone(), password)?);
        info!(
            key_store = %self.name,
            alias = %alias,
            fingerprint = ?material.fingerprint(),
            "Generated key pair"
        );
        Ok(material)
    }
}

impl std::fmt::Debug for KeyStoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStoreService")
            .field("name", &self.name)
            .field("backing", &self.backing)
            .field("entries", &self.size())
            .finish()
    }
}

/// Result of [`KeyStoreService::read_all_aliases`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum AliasListing {
    Names(Vec<String>),
    Details(Vec<AliasInfo>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_store(dir: &TempDir) -> KeyStoreService {
        KeyStoreService::new(
            "accounts",
            KeyStoreBacking::File(dir.path().join("accounts.json")),
            Some("changeit".to_string()),
        )
    }

    fn fileless_store() -> KeyStoreService {
        KeyStoreService::new(
            "volatile",
            KeyStoreBacking::Fileless {
                store_type: "memory".to_string(),
            },
            None,
        )
    }

    #[test]
    fn test_store_and_reload() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.load().unwrap();
        let material = store.generate_key_pair("ops", "ops", Some("keypw")).unwrap();
        store.store().unwrap();

        let reopened = file_store(&dir);
        reopened.load().unwrap();
        assert_eq!(reopened.aliases(), vec!["ops"]);
        assert_eq!(reopened.private_key("ops", Some("keypw")).unwrap(), material);
    }

    #[test]
    fn test_private_keys_encrypted_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        let protected = store
            .generate_key_pair("ops", "ops", Some("entry-secret"))
            .unwrap();
        let plain = store.generate_key_pair("plain", "plain", None).unwrap();
        store.store().unwrap();

        let raw = fs::read_to_string(dir.path().join("accounts.json")).unwrap();
        assert!(!raw.contains("PRIVATE KEY"));
        assert!(!raw.contains(&protected.private_key_pem));
        assert!(!raw.contains(&plain.private_key_pem));
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(doc["entries"]
            .as_array()
            .unwrap()
            .iter()
            .all(|entry| entry.get("private_key_pem").is_none()));

        let reopened = file_store(&dir);
        reopened.load().unwrap();
        assert_eq!(reopened.private_key("ops", Some("entry-secret")).unwrap(), protected);
        assert!(matches!(
            reopened.private_key("ops", None),
            Err(KeyStoreError::WrongPassword { .. })
        ));
        assert_eq!(reopened.private_key("plain", None).unwrap(), plain);
    }

    #[test]
    fn test_entry_password_without_key_store_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("open.json");
        let store = KeyStoreService::new("open", KeyStoreBacking::File(path.clone()), None);
        let protected = store.generate_key_pair("ops", "ops", Some("entry-secret")).unwrap();
        store.store().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains(&protected.private_key_pem));
    }

    #[test]
    fn test_revert_load_restores_previous_entries() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.generate_key_pair("unsaved", "unsaved", None).unwrap();

        // The file does not exist yet, so load empties the store
        let token = store.load().unwrap();
        assert_eq!(store.size(), 0);

        store.revert_load(token);
        assert!(store.contains_alias("unsaved"));
    }

    #[test]
    fn test_fileless_load_keeps_entries() {
        let store = fileless_store();
        store.generate_key_pair("ops", "ops", None).unwrap();
        store.load().unwrap();
        store.store().unwrap();
        assert!(store.contains_alias("ops"));
        assert!(store.path().is_none());
    }

    #[test]
    fn test_remove_alias_is_immediate() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.generate_key_pair("ops", "ops", None).unwrap();
        store.store().unwrap();

        store.remove_alias("ops").unwrap();
        assert!(!store.contains_alias("ops"));
        assert!(matches!(
            store.remove_alias("ops"),
            Err(KeyStoreError::AliasNotFound { .. })
        ));

        // Not persisted until stored
        let reopened = file_store(&dir);
        reopened.load().unwrap();
        assert!(reopened.contains_alias("ops"));
    }

    #[test]
    fn test_read_all_aliases() {
        let store = fileless_store();
        store.generate_key_pair("b", "b", None).unwrap();
        store.generate_key_pair("a", "a", None).unwrap();

        assert_eq!(
            store.read_all_aliases(false, false).unwrap(),
            AliasListing::Names(vec!["a".to_string(), "b".to_string()])
        );
        match store.read_all_aliases(true, true).unwrap() {
            AliasListing::Details(details) => {
                assert_eq!(details.len(), 2);
                assert!(details.iter().all(|d| d.certificate_chain[0].details.is_some()));
            }
            other => panic!("expected details, got {:?}", other),
        }
    }

    #[test]
    fn test_read_missing_alias() {
        let store = fileless_store();
        assert!(matches!(
            store.read_alias("nope", false),
            Err(KeyStoreError::AliasNotFound { .. })
        ));
        assert!(matches!(
            store.private_key("nope", None),
            Err(KeyStoreError::AliasNotFound { .. })
        ));
    }

    #[test]
    fn test_set_entry_replaces() {
        let store = fileless_store();
        let first = store.generate_key_pair("ops", "ops", None).unwrap();
        let second = KeyMaterial::generate("ops").unwrap();
        store.set_entry(KeyStoreEntry::private_key("ops", second.clone(), None).unwrap());

        assert_eq!(store.size(), 1);
        assert_ne!(store.private_key("ops", None).unwrap(), first);
        assert_eq!(store.private_key("ops", None).unwrap(), second);
    }
}
