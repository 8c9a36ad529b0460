//! Reference validation
//!
//! Validates that resource names are legal and that accounts only refer to
//! key stores and certificate authorities that exist.

use crate::ca::is_default_name;
use crate::error::ConfigError;
use crate::Config;

/// Check names and cross-resource references
pub fn check_references(config: &Config) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    for name in config.certificate_authorities.keys() {
        if is_default_name(name) {
            errors.push(ConfigError::ReservedCertificateAuthorityName { name: name.clone() });
        }
    }

    for account in config.accounts.values() {
        if !config.key_stores.contains_key(&account.key_store) {
            errors.push(ConfigError::UnknownKeyStore {
                account: account.name.clone(),
                key_store: account.key_store.clone(),
            });
        }

        if !account.has_alias() {
            errors.push(ConfigError::EmptyAlias {
                account: account.name.clone(),
            });
        }

        let ca = &account.certificate_authority;
        if !is_default_name(ca) && !config.certificate_authorities.contains_key(ca) {
            errors.push(ConfigError::UnknownCertificateAuthority { name: ca.clone() });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountConfig, CertificateAuthorityConfig, KeyStoreConfig};

    fn account(ca: &str, key_store: &str) -> AccountConfig {
        AccountConfig {
            name: "ops".to_string(),
            certificate_authority: ca.to_string(),
            contact_urls: vec![],
            key_store: key_store.to_string(),
            alias: "ops".to_string(),
            credential_reference: None,
        }
    }

    fn key_store(name: &str) -> KeyStoreConfig {
        KeyStoreConfig {
            name: name.to_string(),
            path: None,
            store_type: Some("memory".to_string()),
            credential_reference: None,
        }
    }

    #[test]
    fn test_reserved_name() {
        let mut config = Config::default();
        config.certificate_authorities.insert(
            "LETSENCRYPT".to_string(),
            CertificateAuthorityConfig {
                name: "LETSENCRYPT".to_string(),
                url: "https://acme.example/directory".to_string(),
                staging_url: None,
            },
        );

        assert_eq!(
            check_references(&config),
            vec![ConfigError::ReservedCertificateAuthorityName {
                name: "LETSENCRYPT".to_string()
            }]
        );
    }

    #[test]
    fn test_dangling_references() {
        let mut config = Config::default();
        config
            .accounts
            .insert("ops".to_string(), account("missing-ca", "missing-ks"));

        let errors = check_references(&config);
        assert!(errors.contains(&ConfigError::UnknownKeyStore {
            account: "ops".to_string(),
            key_store: "missing-ks".to_string()
        }));
        assert!(errors.contains(&ConfigError::UnknownCertificateAuthority {
            name: "missing-ca".to_string()
        }));
    }

    #[test]
    fn test_default_ca_any_case() {
        let mut config = Config::default();
        config.key_stores.insert("ks".to_string(), key_store("ks"));
        config
            .accounts
            .insert("ops".to_string(), account("letsencrypt", "ks"));

        assert!(check_references(&config).is_empty());
    }

    #[test]
    fn test_blank_alias() {
        let mut config = Config::default();
        config.key_stores.insert("ks".to_string(), key_store("ks"));
        let mut blank = account("LetsEncrypt", "ks");
        blank.alias = "   ".to_string();
        config.accounts.insert("ops".to_string(), blank);

        assert_eq!(
            check_references(&config),
            vec![ConfigError::EmptyAlias {
                account: "ops".to_string()
            }]
        );
    }
}
