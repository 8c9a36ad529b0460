//! Key store validation
//!
//! Validates key store backing definitions and credential references.

use crate::error::ConfigError;
use crate::resources::CredentialReference;
use crate::Config;

/// Check key store definitions
pub fn check_key_stores(config: &Config) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    for key_store in config.key_stores.values() {
        if key_store.is_fileless() && key_store.store_type.is_none() {
            errors.push(ConfigError::MissingKeyStoreType {
                key_store: key_store.name.clone(),
            });
        }
    }

    let references = config
        .key_stores
        .values()
        .filter_map(|ks| ks.credential_reference.as_ref())
        .chain(
            config
                .accounts
                .values()
                .filter_map(|a| a.credential_reference.as_ref()),
        );

    for reference in references {
        if let CredentialReference::Store { store, .. } = reference {
            errors.push(ConfigError::UnsupportedCredentialStore {
                store: store.clone(),
            });
        }
    }

    errors
}
