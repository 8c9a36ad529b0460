//! `certificate-authority-account` resource definition.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use keyward_common::{Producer, Resolvable, ServiceBuilder};
use keyward_config::{AccountConfig, CertificateAuthority, ConfigError, CredentialReference};

use super::client::AcmeAccount;
use crate::capabilities::KeyStoreCell;
use crate::context::OperationContext;
use crate::error::OperationError;
use crate::keystore::{KeyMaterial, KeyStoreEntry, KeyStoreService};

/// Observed lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountStatus {
    Unregistered,
    Registered,
    KeyRotated,
    Deactivated,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountStatus::Unregistered => "unregistered",
            AccountStatus::Registered => "registered",
            AccountStatus::KeyRotated => "key-rotated",
            AccountStatus::Deactivated => "deactivated",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct AccountSession {
    status: AccountStatus,
    terms_of_service_agreed: bool,
}

/// Live account value: CA binding, contacts and key location.
///
/// Holds no key material itself. The key is read from the key store each
/// time it is needed.
pub struct AccountBinding {
    name: String,
    certificate_authority: CertificateAuthority,
    contact_urls: Vec<String>,
    alias: String,
    credential_reference: Option<CredentialReference>,
    key_store: Arc<KeyStoreService>,
    session: RwLock<AccountSession>,
}

impl AccountBinding {
    fn new(definition: &AccountDefinition, key_store: Arc<KeyStoreService>) -> Self {
        Self {
            name: definition.config.name.clone(),
            certificate_authority: definition.certificate_authority.clone(),
            contact_urls: definition.config.contact_urls.clone(),
            alias: definition.config.alias.clone(),
            credential_reference: definition.config.credential_reference.clone(),
            key_store,
            session: RwLock::new(AccountSession {
                status: AccountStatus::Unregistered,
                terms_of_service_agreed: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn certificate_authority(&self) -> &CertificateAuthority {
        &self.certificate_authority
    }

    pub fn contact_urls(&self) -> &[String] {
        &self.contact_urls
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn key_store(&self) -> &Arc<KeyStoreService> {
        &self.key_store
    }

    pub fn status(&self) -> AccountStatus {
        self.session.read().status
    }

    pub fn terms_of_service_agreed(&self) -> bool {
        self.session.read().terms_of_service_agreed
    }

    pub(crate) fn set_terms_of_service_agreed(&self, agreed: bool) {
        self.session.write().terms_of_service_agreed = agreed;
    }

    pub(crate) fn transition(&self, status: AccountStatus) {
        let mut session = self.session.write();
        debug!(account = %self.name, from = %session.status, to = %status, "Account status changed");
        session.status = status;
    }

    fn key_password(&self) -> Result<Option<String>, OperationError> {
        Ok(self
            .credential_reference
            .as_ref()
            .map(|reference| reference.resolve())
            .transpose()?)
    }

    /// The key currently enrolled for the account
    pub fn current_key(&self) -> Result<KeyMaterial, OperationError> {
        let password = self.key_password()?;
        Ok(self.key_store.private_key(&self.alias, password.as_deref())?)
    }

    /// Account view for one request against the production or staging endpoint
    pub fn acme_account(&self, staging: bool) -> Result<AcmeAccount, OperationError> {
        let directory_url = self.certificate_authority.endpoint(staging)?.clone();
        Ok(AcmeAccount {
            name: self.name.clone(),
            directory_url,
            contact_urls: self.contact_urls.clone(),
            terms_of_service_agreed: self.terms_of_service_agreed(),
            key: self.current_key()?,
        })
    }

    /// Replace the enrolled key at the account's alias and persist it
    pub(crate) fn enroll_key(&self, key: KeyMaterial) -> Result<(), OperationError> {
        let password = self.key_password()?;
        let fingerprint = key.fingerprint();
        self.key_store
            .set_entry(KeyStoreEntry::private_key(&self.alias, key, password.as_deref())?);
        self.key_store.store()?;

        info!(
            account = %self.name,
            key_store = %self.key_store.name(),
            alias = %self.alias,
            fingerprint = ?fingerprint,
            "Enrolled new account key"
        );
        Ok(())
    }
}

impl fmt::Debug for AccountBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountBinding")
            .field("name", &self.name)
            .field("certificate_authority", &self.certificate_authority.name())
            .field("key_store", &self.key_store.name())
            .field("alias", &self.alias)
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Configuration of an account resource, with its references resolved.
#[derive(Debug, Clone)]
pub struct AccountDefinition {
    pub config: AccountConfig,
    pub certificate_authority: CertificateAuthority,
    pub key_store: Arc<KeyStoreCell>,
}

/// Resolvable `certificate-authority-account` resource.
#[derive(Debug, Clone)]
pub struct AccountResource {
    name: String,
}

impl AccountResource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Resolvable for AccountResource {
    type Context = OperationContext;
    type Configuration = AccountDefinition;
    type Value = Arc<AccountBinding>;
    type Error = OperationError;

    fn read_configuration(&self, context: &OperationContext) -> Result<AccountDefinition, OperationError> {
        let config = context.model().account(&self.name).cloned().ok_or_else(|| {
            OperationError::ProviderState(format!(
                "certificate authority account '{}' is not defined",
                self.name
            ))
        })?;

        if !config.has_alias() {
            return Err(ConfigError::EmptyAlias {
                account: self.name.clone(),
            }
            .into());
        }

        let certificate_authority = context
            .capabilities()
            .certificate_authorities()
            .resolve(&config.certificate_authority)?;
        let key_store = context.capabilities().key_store(&config.key_store)?;

        Ok(AccountDefinition {
            config,
            certificate_authority,
            key_store,
        })
    }

    fn create_immediately(
        &self,
        context: &OperationContext,
        definition: &AccountDefinition,
    ) -> Result<Arc<AccountBinding>, OperationError> {
        let key_store = definition.key_store.direct_access(Some(context))?;
        debug!(account = %self.name, key_store = %key_store.name(), "Created account binding");
        Ok(Arc::new(AccountBinding::new(definition, key_store)))
    }

    fn prepare_service(
        &self,
        _context: &OperationContext,
        definition: &AccountDefinition,
        builder: &mut ServiceBuilder,
    ) -> Result<Producer<Arc<AccountBinding>, OperationError>, OperationError> {
        builder.requires(definition.key_store.address());

        let definition = definition.clone();
        Ok(Box::new(move || {
            let key_store = definition.key_store.deferred_get()?;
            Ok(Arc::new(AccountBinding::new(&definition, key_store)))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use keyward_common::{Address, ResolutionCell};
    use keyward_config::{CertificateAuthorityRegistry, Config, KeyStoreConfig};

    fn context(account: AccountConfig) -> OperationContext {
        let mut config = Config::default();
        config.key_stores.insert(
            "volatile".to_string(),
            KeyStoreConfig {
                name: "volatile".to_string(),
                path: None,
                store_type: Some("memory".to_string()),
                credential_reference: None,
            },
        );
        config.accounts.insert(account.name.clone(), account);

        let capabilities = CapabilityRegistry::new(CertificateAuthorityRegistry::new());
        capabilities.declare_key_store("volatile");
        OperationContext::new(Arc::new(config), Arc::new(capabilities))
    }

    fn account_config(key_store: &str, alias: &str) -> AccountConfig {
        AccountConfig {
            name: "ops".to_string(),
            certificate_authority: "LetsEncrypt".to_string(),
            contact_urls: vec!["mailto:ops@example.com".to_string()],
            key_store: key_store.to_string(),
            alias: alias.to_string(),
            credential_reference: None,
        }
    }

    fn cell() -> ResolutionCell<AccountResource> {
        ResolutionCell::new(Address::account("ops"), AccountResource::new("ops"))
    }

    #[test]
    fn test_direct_access_binds_key_store() {
        let ctx = context(account_config("volatile", "ops"));
        let binding = cell().direct_access(Some(&ctx)).unwrap();

        assert_eq!(binding.status(), AccountStatus::Unregistered);
        assert_eq!(binding.certificate_authority().name(), "LetsEncrypt");
        assert_eq!(binding.key_store().name(), "volatile");
        // No key enrolled yet
        assert!(matches!(binding.current_key(), Err(OperationError::KeyStore(_))));
    }

    #[test]
    fn test_account_view_reads_current_key() {
        let ctx = context(account_config("volatile", "ops"));
        let binding = cell().direct_access(Some(&ctx)).unwrap();
        let first = binding.key_store().generate_key_pair("ops", "ops", None).unwrap();
        assert_eq!(binding.acme_account(false).unwrap().key, first);

        let second = KeyMaterial::generate("ops").unwrap();
        binding.enroll_key(second.clone()).unwrap();
        let account = binding.acme_account(true).unwrap();
        assert_eq!(account.key, second);
        assert!(account.directory_url.as_str().contains("staging"));
    }

    #[test]
    fn test_missing_key_store_is_provider_state_error() {
        let ctx = context(account_config("absent", "ops"));
        assert!(matches!(
            cell().direct_access(Some(&ctx)),
            Err(OperationError::ProviderState(_))
        ));
    }

    #[test]
    fn test_empty_alias_rejected() {
        let ctx = context(account_config("volatile", ""));
        assert!(matches!(
            cell().direct_access(Some(&ctx)),
            Err(OperationError::Configuration(ConfigError::EmptyAlias { .. }))
        ));
    }

    #[test]
    fn test_blank_alias_rejected() {
        let ctx = context(account_config("volatile", "  \t"));
        assert!(matches!(
            cell().direct_access(Some(&ctx)),
            Err(OperationError::Configuration(ConfigError::EmptyAlias { .. }))
        ));
    }

    #[test]
    fn test_prepare_requires_key_store() {
        let ctx = context(account_config("volatile", "ops"));
        let cell = cell();
        ctx.capabilities()
            .key_store("volatile")
            .unwrap()
            .prepare_dependent_service(&ctx, &mut ServiceBuilder::new(Address::key_store("volatile")))
            .unwrap();

        let mut builder = ServiceBuilder::new(cell.address().clone());
        cell.prepare_dependent_service(&ctx, &mut builder).unwrap();
        assert_eq!(cell.requirements(), &[Address::key_store("volatile")]);

        let binding = cell.deferred_get().unwrap();
        assert_eq!(binding.alias(), "ops");
    }
}
