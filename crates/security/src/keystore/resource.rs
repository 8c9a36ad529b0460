//! `key-store` resource definition.

use std::sync::Arc;

use tracing::{debug, info};

use keyward_common::{Producer, Resolvable, ServiceBuilder};
use keyward_config::{ConfigError, KeyStoreConfig};

use super::{KeyStoreBacking, KeyStoreService};
use crate::context::OperationContext;
use crate::error::OperationError;

/// Resolvable `key-store` resource.
#[derive(Debug, Clone)]
pub struct KeyStoreResource {
    name: String,
}

impl KeyStoreResource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Build and load the key store described by `config`
fn open(config: &KeyStoreConfig) -> Result<KeyStoreService, OperationError> {
    let backing = match (&config.path, &config.store_type) {
        (Some(path), _) => KeyStoreBacking::File(path.clone()),
        (None, Some(store_type)) => KeyStoreBacking::Fileless {
            store_type: store_type.clone(),
        },
        (None, None) => {
            return Err(ConfigError::MissingKeyStoreType {
                key_store: config.name.clone(),
            }
            .into())
        }
    };
    let password = config
        .credential_reference
        .as_ref()
        .map(|reference| reference.resolve())
        .transpose()?;

    let service = KeyStoreService::new(&config.name, backing, password);
    service.load()?;

    info!(
        key_store = %config.name,
        fileless = config.is_fileless(),
        entries = service.size(),
        "Key store ready"
    );
    Ok(service)
}

impl Resolvable for KeyStoreResource {
    type Context = OperationContext;
    type Configuration = KeyStoreConfig;
    type Value = Arc<KeyStoreService>;
    type Error = OperationError;

    fn read_configuration(&self, context: &OperationContext) -> Result<KeyStoreConfig, OperationError> {
        let config = context.model().key_store(&self.name).cloned().ok_or_else(|| {
            OperationError::ProviderState(format!("key store '{}' is not defined", self.name))
        })?;

        if config.is_fileless() && config.store_type.is_none() {
            return Err(ConfigError::MissingKeyStoreType {
                key_store: self.name.clone(),
            }
            .into());
        }
        Ok(config)
    }

    fn create_immediately(
        &self,
        _context: &OperationContext,
        configuration: &KeyStoreConfig,
    ) -> Result<Arc<KeyStoreService>, OperationError> {
        debug!(key_store = %self.name, "Creating key store for management operation");
        open(configuration).map(Arc::new)
    }

    fn prepare_service(
        &self,
        _context: &OperationContext,
        configuration: &KeyStoreConfig,
        _builder: &mut ServiceBuilder,
    ) -> Result<Producer<Arc<KeyStoreService>, OperationError>, OperationError> {
        let configuration = configuration.clone();
        Ok(Box::new(move || open(&configuration).map(Arc::new)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use keyward_common::{Address, ResolutionCell};
    use keyward_config::{CertificateAuthorityRegistry, Config, CredentialReference};
    use tempfile::TempDir;

    fn context_with(key_store: KeyStoreConfig) -> OperationContext {
        let mut config = Config::default();
        config.key_stores.insert(key_store.name.clone(), key_store);
        OperationContext::new(
            Arc::new(config),
            Arc::new(CapabilityRegistry::new(CertificateAuthorityRegistry::new())),
        )
    }

    fn cell(name: &str) -> ResolutionCell<KeyStoreResource> {
        ResolutionCell::new(Address::key_store(name), KeyStoreResource::new(name))
    }

    #[test]
    fn test_direct_access_opens_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ks.json");
        let seeded = KeyStoreService::new("ks", KeyStoreBacking::File(path.clone()), Some("pw".into()));
        seeded.generate_key_pair("ops", "ops", None).unwrap();
        seeded.store().unwrap();

        let ctx = context_with(KeyStoreConfig {
            name: "ks".to_string(),
            path: Some(path),
            store_type: None,
            credential_reference: Some(CredentialReference::ClearText("pw".to_string())),
        });
        let cell = cell("ks");

        let service = cell.direct_access(Some(&ctx)).unwrap();
        assert!(service.contains_alias("ops"));
        // Memoized
        assert!(Arc::ptr_eq(&service, &cell.direct_access(None).unwrap()));
    }

    #[test]
    fn test_fileless_requires_type() {
        let ctx = context_with(KeyStoreConfig {
            name: "ks".to_string(),
            path: None,
            store_type: None,
            credential_reference: None,
        });

        assert!(matches!(
            cell("ks").direct_access(Some(&ctx)),
            Err(OperationError::Configuration(ConfigError::MissingKeyStoreType { .. }))
        ));
    }

    #[test]
    fn test_undefined_key_store() {
        let ctx = context_with(KeyStoreConfig {
            name: "other".to_string(),
            path: None,
            store_type: Some("memory".to_string()),
            credential_reference: None,
        });

        assert!(matches!(
            cell("ks").direct_access(Some(&ctx)),
            Err(OperationError::ProviderState(_))
        ));
    }

    #[test]
    fn test_deferred_path() {
        let ctx = context_with(KeyStoreConfig {
            name: "ks".to_string(),
            path: None,
            store_type: Some("memory".to_string()),
            credential_reference: None,
        });
        let cell = cell("ks");

        let mut builder = ServiceBuilder::new(cell.address().clone());
        cell.prepare_dependent_service(&ctx, &mut builder).unwrap();
        assert!(cell.requirements().is_empty());

        let service = cell.deferred_get().unwrap();
        assert_eq!(service.name(), "ks");
        assert!(cell.is_resolved());
    }
}
