//! Security resource configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ca::DEFAULT_CERTIFICATE_AUTHORITY;
use crate::error::ConfigError;

// ============================================================================
// Certificate Authorities
// ============================================================================

/// A user-defined certificate authority endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateAuthorityConfig {
    /// Logical name referenced by accounts
    pub name: String,
    /// ACME directory URL
    pub url: String,
    /// ACME directory URL of the non-production endpoint
    #[serde(default)]
    pub staging_url: Option<String>,
}

// ============================================================================
// Credential References
// ============================================================================

/// Indirect pointer to a secret such as a key store or key entry password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialReference {
    /// Secret given inline in the configuration
    ClearText(String),
    /// Secret read from an environment variable when resolved
    Env(String),
    /// Secret held by a credential store under an alias
    Store { store: String, alias: String },
}

impl CredentialReference {
    /// Resolve the reference to the secret it points at.
    pub fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            CredentialReference::ClearText(secret) => Ok(secret.clone()),
            CredentialReference::Env(var) => std::env::var(var).map_err(|e| {
                ConfigError::CredentialUnavailable(format!("environment variable {}: {}", var, e))
            }),
            CredentialReference::Store { store, .. } => {
                Err(ConfigError::UnsupportedCredentialStore {
                    store: store.clone(),
                })
            }
        }
    }
}

// Never print secrets
impl fmt::Debug for CredentialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialReference::ClearText(_) => f.write_str("ClearText(****)"),
            CredentialReference::Env(var) => f.debug_tuple("Env").field(var).finish(),
            CredentialReference::Store { store, alias } => f
                .debug_struct("Store")
                .field("store", store)
                .field("alias", alias)
                .finish(),
        }
    }
}

// ============================================================================
// Key Stores
// ============================================================================

/// Key store definition.
///
/// A key store with a `path` is file-backed. A key store without one is
/// "fileless": its content lives with its provider, and a `store_type`
/// naming that provider is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    pub name: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub store_type: Option<String>,
    #[serde(default)]
    pub credential_reference: Option<CredentialReference>,
}

impl KeyStoreConfig {
    pub fn is_fileless(&self) -> bool {
        self.path.is_none()
    }
}

// ============================================================================
// Certificate Authority Accounts
// ============================================================================

/// Certificate authority account definition.
///
/// The account's key pair and certificate live in `key_store` under `alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    #[serde(default = "default_certificate_authority")]
    pub certificate_authority: String,
    #[serde(default)]
    pub contact_urls: Vec<String>,
    pub key_store: String,
    pub alias: String,
    #[serde(default)]
    pub credential_reference: Option<CredentialReference>,
}

impl AccountConfig {
    /// Whether the account names a usable alias; blank aliases are not
    pub fn has_alias(&self) -> bool {
        !self.alias.trim().is_empty()
    }
}

pub fn default_certificate_authority() -> String {
    DEFAULT_CERTIFICATE_AUTHORITY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_text_resolves() {
        let reference = CredentialReference::ClearText("secret".to_string());
        assert_eq!(reference.resolve().unwrap(), "secret");
    }

    #[test]
    fn test_missing_env_is_unavailable() {
        let reference = CredentialReference::Env("KEYWARD_TEST_UNSET_VARIABLE".to_string());
        assert!(matches!(
            reference.resolve(),
            Err(ConfigError::CredentialUnavailable(_))
        ));
    }

    #[test]
    fn test_store_reference_unsupported() {
        let reference = CredentialReference::Store {
            store: "vault".to_string(),
            alias: "ks".to_string(),
        };
        assert_eq!(
            reference.resolve(),
            Err(ConfigError::UnsupportedCredentialStore {
                store: "vault".to_string()
            })
        );
    }

    #[test]
    fn test_debug_hides_clear_text() {
        let reference = CredentialReference::ClearText("hunter2".to_string());
        assert!(!format!("{:?}", reference).contains("hunter2"));
    }
}
