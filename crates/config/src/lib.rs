//! Keyward Configuration
//!
//! Loads the security subsystem configuration from KDL and validates it.
//!
//! ```kdl
//! certificate-authority "internal" {
//!     url "https://acme.internal.example/directory"
//! }
//!
//! key-store "accounts" {
//!     path "/var/lib/keyward/accounts.json"
//!     credential-reference clear-text="changeit"
//! }
//!
//! certificate-authority-account "ops" {
//!     contact-urls "mailto:ops@example.com"
//!     key-store "accounts"
//!     alias "ops"
//! }
//! ```

pub mod ca;
pub mod error;
pub mod kdl;
pub mod resources;
pub mod validate;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub use ca::{
    CertificateAuthority, CertificateAuthorityRegistry, DEFAULT_CERTIFICATE_AUTHORITY,
};
pub use error::ConfigError;
pub use resources::{AccountConfig, CertificateAuthorityConfig, CredentialReference, KeyStoreConfig};
pub use validate::{ValidationError, ValidationResult, ValidationWarning};

/// Security subsystem configuration model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// User-defined certificate authorities by name
    #[serde(default)]
    pub certificate_authorities: BTreeMap<String, CertificateAuthorityConfig>,
    /// Key stores by name
    #[serde(default)]
    pub key_stores: BTreeMap<String, KeyStoreConfig>,
    /// Certificate authority accounts by name
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

impl Config {
    /// Load configuration from a KDL file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration file");

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_kdl(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        info!(
            path = %path.display(),
            accounts = config.accounts.len(),
            key_stores = config.key_stores.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from KDL text
    pub fn from_kdl(content: &str) -> Result<Self> {
        crate::kdl::parse_config(content)
    }

    /// Run structural validation, failing on the first error
    pub fn validate(&self) -> Result<(), ConfigError> {
        match validate::check_config(self).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn key_store(&self, name: &str) -> Option<&KeyStoreConfig> {
        self.key_stores.get(name)
    }

    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.get(name)
    }

    pub fn certificate_authority(&self, name: &str) -> Option<&CertificateAuthorityConfig> {
        self.certificate_authorities.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"key-store "volatile" {{
    type "memory"
}}
certificate-authority-account "ops" {{
    key-store "volatile"
    alias "ops"
}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.account("ops").unwrap().key_store, "volatile");
        assert!(config.key_store("volatile").is_some());
        assert!(config.certificate_authority("LetsEncrypt").is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/keyward.kdl").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_validate_reports_first_error() {
        let mut config = Config::default();
        config.key_stores.insert(
            "ks".to_string(),
            KeyStoreConfig {
                name: "ks".to_string(),
                path: None,
                store_type: None,
                credential_reference: None,
            },
        );

        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingKeyStoreType {
                key_store: "ks".to_string()
            })
        );
        assert!(!validate::validate_config(&config).is_valid());
    }
}
