//! Security subsystem
//!
//! Owns the configuration model, the certificate authority registry and one
//! resolution cell per configured key store and account.
//!
//! Resources are reached two ways:
//!
//! - Management operations call [`SecuritySubsystem::key_store`] or an
//!   [`AccountManager`] with an [`OperationContext`]; the resource is created
//!   on the spot if nothing resolved it yet.
//! - [`SecuritySubsystem::boot`] prepares a producer for every resource and
//!   [`SecuritySubsystem::start`] runs them.
//!
//! Either way a resource is created once.

use std::sync::Arc;

use tracing::{debug, info};

use keyward_common::ServiceBuilder;
use keyward_config::{
    CertificateAuthority, CertificateAuthorityConfig, CertificateAuthorityRegistry, Config,
};

use crate::acme::{AccountManager, AcmeClient};
use crate::capabilities::CapabilityRegistry;
use crate::context::OperationContext;
use crate::error::OperationError;
use crate::keystore::KeyStoreService;

/// The security subsystem.
pub struct SecuritySubsystem {
    model: Arc<Config>,
    capabilities: Arc<CapabilityRegistry>,
    client: Arc<dyn AcmeClient>,
}

impl SecuritySubsystem {
    /// Register certificate authorities and declare every configured resource.
    ///
    /// Nothing is resolved yet. Structural configuration errors, including a
    /// certificate authority using the reserved default name, fail here.
    pub fn new(config: Config, client: Arc<dyn AcmeClient>) -> Result<Self, OperationError> {
        let authorities = CertificateAuthorityRegistry::from_config(&config)?;
        config.validate()?;

        let capabilities = CapabilityRegistry::new(authorities);
        for name in config.key_stores.keys() {
            capabilities.declare_key_store(name);
        }
        for name in config.accounts.keys() {
            capabilities.declare_account(name);
        }

        info!(
            certificate_authorities = capabilities.certificate_authorities().names().len(),
            key_stores = config.key_stores.len(),
            accounts = config.accounts.len(),
            "Security subsystem configured"
        );

        Ok(Self {
            model: Arc::new(config),
            capabilities: Arc::new(capabilities),
            client,
        })
    }

    pub fn model(&self) -> &Config {
        &self.model
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Context for one management operation
    pub fn operation_context(&self) -> OperationContext {
        OperationContext::new(self.model.clone(), self.capabilities.clone())
    }

    /// Add a certificate authority at runtime
    pub fn add_certificate_authority(
        &self,
        config: &CertificateAuthorityConfig,
    ) -> Result<(), OperationError> {
        let ca = CertificateAuthority::try_from(config)?;
        self.capabilities.certificate_authorities().register(ca)?;
        Ok(())
    }

    /// Prepare the service-start producer of every resource
    pub fn boot(&self, context: &OperationContext) -> Result<(), OperationError> {
        for name in self.capabilities.key_store_names() {
            let cell = self.capabilities.key_store(&name)?;
            let mut builder = ServiceBuilder::new(cell.address().clone());
            cell.prepare_dependent_service(context, &mut builder)?;
        }
        for name in self.capabilities.account_names() {
            let cell = self.capabilities.account(&name)?;
            let mut builder = ServiceBuilder::new(cell.address().clone());
            cell.prepare_dependent_service(context, &mut builder)?;
        }

        debug!("Security subsystem booted");
        Ok(())
    }

    /// Start every resource through its prepared producer
    pub fn start(&self) -> Result<(), OperationError> {
        for name in self.capabilities.key_store_names() {
            self.capabilities.key_store(&name)?.deferred_get()?;
        }
        for name in self.capabilities.account_names() {
            self.capabilities.account(&name)?.deferred_get()?;
        }

        info!(
            key_stores = self.capabilities.key_store_names().len(),
            accounts = self.capabilities.account_names().len(),
            "Security subsystem started"
        );
        Ok(())
    }

    /// Live key store, created on first access
    pub fn key_store(
        &self,
        context: &OperationContext,
        name: &str,
    ) -> Result<Arc<KeyStoreService>, OperationError> {
        self.capabilities.key_store(name)?.direct_access(Some(context))
    }

    /// Reload a key store from its backing store.
    ///
    /// Rolling back `context` restores the entries held before the load.
    pub fn load_key_store(&self, context: &OperationContext, name: &str) -> Result<(), OperationError> {
        let key_store = self.key_store(context, name)?;
        let token = key_store.load()?;

        let reverted = key_store.clone();
        context.add_rollback_handler(move || reverted.revert_load(token));
        Ok(())
    }

    /// Lifecycle operations for one account
    pub fn account_manager(&self, name: &str) -> Result<AccountManager, OperationError> {
        let cell = self.capabilities.account(name)?;
        Ok(AccountManager::new(cell, self.client.clone()))
    }
}

impl std::fmt::Debug for SecuritySubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySubsystem")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acme::{AcmeError, OfflineClient};
    use crate::keystore::{KeyStoreBacking, KeyStoreService};
    use keyward_common::ResolutionError;
    use keyward_config::ConfigError;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config::from_kdl(&format!(
            r#"
certificate-authority "internal" {{
    url "https://acme.internal.example/directory"
}}

key-store "accounts" {{
    path "{}"
    credential-reference clear-text="changeit"
}}

certificate-authority-account "ops" {{
    certificate-authority "internal"
    contact-urls "mailto:ops@example.com"
    key-store "accounts"
    alias "ops"
}}
"#,
            dir.path().join("accounts.json").display()
        ))
        .unwrap()
    }

    fn subsystem(dir: &TempDir) -> SecuritySubsystem {
        SecuritySubsystem::new(config(dir), Arc::new(OfflineClient)).unwrap()
    }

    #[test]
    fn test_reserved_certificate_authority_rejected_at_add_time() {
        let mut config = Config::default();
        config.certificate_authorities.insert(
            "LetsEncrypt".to_string(),
            CertificateAuthorityConfig {
                name: "LetsEncrypt".to_string(),
                url: "https://evil.example/directory".to_string(),
                staging_url: None,
            },
        );

        let err = SecuritySubsystem::new(config, Arc::new(OfflineClient)).unwrap_err();
        assert!(matches!(
            err,
            OperationError::Configuration(ConfigError::ReservedCertificateAuthorityName { .. })
        ));
    }

    #[test]
    fn test_runtime_add_of_reserved_name_rejected() {
        let dir = TempDir::new().unwrap();
        let subsystem = subsystem(&dir);

        let err = subsystem
            .add_certificate_authority(&CertificateAuthorityConfig {
                name: "letsencrypt".to_string(),
                url: "https://evil.example/directory".to_string(),
                staging_url: None,
            })
            .unwrap_err();
        assert!(matches!(err, OperationError::Configuration(_)));
        // Nothing was resolved
        assert!(!subsystem.capabilities().key_store("accounts").unwrap().is_resolved());
    }

    #[test]
    fn test_boot_and_start_share_the_management_value() {
        let dir = TempDir::new().unwrap();
        let subsystem = subsystem(&dir);
        let ctx = subsystem.operation_context();

        subsystem.boot(&ctx).unwrap();
        let account = subsystem.capabilities().account("ops").unwrap();
        assert_eq!(
            account.requirements(),
            &[keyward_common::Address::key_store("accounts")]
        );

        subsystem.start().unwrap();
        let started = subsystem.capabilities().key_store("accounts").unwrap().deferred_get().unwrap();
        let managed = subsystem.key_store(&ctx, "accounts").unwrap();
        assert!(Arc::ptr_eq(&started, &managed));
        ctx.complete();
    }

    #[test]
    fn test_unresolved_account_without_context_is_illegal() {
        let dir = TempDir::new().unwrap();
        let subsystem = subsystem(&dir);

        let err = subsystem
            .capabilities()
            .account("ops")
            .unwrap()
            .direct_access(None)
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::Resolution(ResolutionError::IllegalInitialization { .. })
        ));
    }

    #[test]
    fn test_load_rolled_back() {
        let dir = TempDir::new().unwrap();
        let subsystem = subsystem(&dir);

        let ctx = subsystem.operation_context();
        let key_store = subsystem.key_store(&ctx, "accounts").unwrap();
        key_store.generate_key_pair("unsaved", "unsaved", None).unwrap();
        ctx.complete();

        // The file holds nothing, so loading drops the unsaved alias
        let ctx = subsystem.operation_context();
        subsystem.load_key_store(&ctx, "accounts").unwrap();
        assert!(!key_store.contains_alias("unsaved"));

        ctx.rollback();
        assert!(key_store.contains_alias("unsaved"));
    }

    #[test]
    fn test_load_picks_up_external_changes() {
        let dir = TempDir::new().unwrap();
        let subsystem = subsystem(&dir);
        let ctx = subsystem.operation_context();
        let key_store = subsystem.key_store(&ctx, "accounts").unwrap();
        assert_eq!(key_store.size(), 0);

        let writer = KeyStoreService::new(
            "accounts",
            KeyStoreBacking::File(dir.path().join("accounts.json")),
            Some("changeit".to_string()),
        );
        writer.generate_key_pair("ops", "ops", None).unwrap();
        writer.store().unwrap();

        subsystem.load_key_store(&ctx, "accounts").unwrap();
        ctx.complete();
        assert!(key_store.contains_alias("ops"));
    }

    #[test]
    fn test_unknown_account_is_provider_state_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            subsystem(&dir).account_manager("absent"),
            Err(OperationError::ProviderState(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_client_reports_protocol_error() {
        let dir = TempDir::new().unwrap();
        let subsystem = subsystem(&dir);
        let ctx = subsystem.operation_context();
        subsystem
            .key_store(&ctx, "accounts")
            .unwrap()
            .generate_key_pair("ops", "ops", None)
            .unwrap();

        let manager = subsystem.account_manager("ops").unwrap();
        let err = manager.get_metadata(&ctx, false).await.unwrap_err();
        assert!(matches!(err, OperationError::Protocol(AcmeError::Unavailable)));
    }
}
