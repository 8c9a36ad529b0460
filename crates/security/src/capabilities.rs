//! Capability registry
//!
//! Named resources of the subsystem, each wrapped in a resolution cell so
//! that dependents resolve them lazily and at most once.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use keyward_common::{Address, ResolutionCell};
use keyward_config::CertificateAuthorityRegistry;

use crate::acme::AccountResource;
use crate::error::OperationError;
use crate::keystore::KeyStoreResource;

pub type KeyStoreCell = ResolutionCell<KeyStoreResource>;
pub type AccountCell = ResolutionCell<AccountResource>;

/// Registry of the subsystem's resolvable resources.
#[derive(Debug)]
pub struct CapabilityRegistry {
    certificate_authorities: CertificateAuthorityRegistry,
    key_stores: DashMap<String, Arc<KeyStoreCell>>,
    accounts: DashMap<String, Arc<AccountCell>>,
}

impl CapabilityRegistry {
    pub fn new(certificate_authorities: CertificateAuthorityRegistry) -> Self {
        Self {
            certificate_authorities,
            key_stores: DashMap::new(),
            accounts: DashMap::new(),
        }
    }

    pub fn certificate_authorities(&self) -> &CertificateAuthorityRegistry {
        &self.certificate_authorities
    }

    /// Declare a key store; an existing declaration is kept
    pub fn declare_key_store(&self, name: &str) -> Arc<KeyStoreCell> {
        self.key_stores
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(address = %Address::key_store(name), "Declared key store");
                Arc::new(ResolutionCell::new(
                    Address::key_store(name),
                    KeyStoreResource::new(name),
                ))
            })
            .clone()
    }

    /// Declare an account; an existing declaration is kept
    pub fn declare_account(&self, name: &str) -> Arc<AccountCell> {
        self.accounts
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(address = %Address::account(name), "Declared account");
                Arc::new(ResolutionCell::new(
                    Address::account(name),
                    AccountResource::new(name),
                ))
            })
            .clone()
    }

    pub fn key_store(&self, name: &str) -> Result<Arc<KeyStoreCell>, OperationError> {
        self.key_stores
            .get(name)
            .map(|cell| cell.value().clone())
            .ok_or_else(|| {
                OperationError::ProviderState(format!("key store '{}' is not defined", name))
            })
    }

    pub fn account(&self, name: &str) -> Result<Arc<AccountCell>, OperationError> {
        self.accounts
            .get(name)
            .map(|cell| cell.value().clone())
            .ok_or_else(|| {
                OperationError::ProviderState(format!(
                    "certificate authority account '{}' is not defined",
                    name
                ))
            })
    }

    pub fn remove_key_store(&self, name: &str) -> Option<Arc<KeyStoreCell>> {
        self.key_stores.remove(name).map(|(_, cell)| cell)
    }

    pub fn remove_account(&self, name: &str) -> Option<Arc<AccountCell>> {
        self.accounts.remove(name).map(|(_, cell)| cell)
    }

    pub fn key_store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.key_stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn account_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.accounts.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_is_idempotent() {
        let registry = CapabilityRegistry::new(CertificateAuthorityRegistry::new());
        let first = registry.declare_key_store("ks");
        let second = registry.declare_key_store("ks");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.address(), &Address::key_store("ks"));
    }

    #[test]
    fn test_missing_capability_is_provider_state_error() {
        let registry = CapabilityRegistry::new(CertificateAuthorityRegistry::new());
        assert!(matches!(
            registry.key_store("absent"),
            Err(OperationError::ProviderState(_))
        ));
        assert!(matches!(
            registry.account("absent"),
            Err(OperationError::ProviderState(_))
        ));
    }

    #[test]
    fn test_names_and_removal() {
        let registry = CapabilityRegistry::new(CertificateAuthorityRegistry::new());
        registry.declare_account("b");
        registry.declare_account("a");
        registry.declare_key_store("ks");

        assert_eq!(registry.account_names(), vec!["a", "b"]);
        assert!(registry.remove_account("a").is_some());
        assert_eq!(registry.account_names(), vec!["b"]);
        assert!(registry.remove_key_store("ks").is_some());
        assert!(registry.key_store_names().is_empty());
    }
}
