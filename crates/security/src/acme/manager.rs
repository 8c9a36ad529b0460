//! Account lifecycle operations.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::account::{AccountBinding, AccountStatus};
use super::client::AcmeClient;
use super::metadata::AcmeMetadata;
use crate::capabilities::AccountCell;
use crate::context::OperationContext;
use crate::error::OperationError;

/// Management operations on one certificate authority account.
///
/// Resolution happens before any remote call, so the resolver lock is never
/// held while waiting on the certificate authority.
pub struct AccountManager {
    account: Arc<AccountCell>,
    client: Arc<dyn AcmeClient>,
}

impl AccountManager {
    pub fn new(account: Arc<AccountCell>, client: Arc<dyn AcmeClient>) -> Self {
        Self { account, client }
    }

    pub fn name(&self) -> &str {
        self.account.resource().name()
    }

    fn binding(&self, context: &OperationContext) -> Result<Arc<AccountBinding>, OperationError> {
        self.account.direct_access(Some(context))
    }

    /// Register the account with its certificate authority.
    ///
    /// Fails with [`OperationError::DuplicateAccount`] if the certificate
    /// authority already knows the account's key.
    pub async fn create_account(
        &self,
        context: &OperationContext,
        agree_to_terms_of_service: bool,
        staging: bool,
    ) -> Result<(), OperationError> {
        let binding = self.binding(context)?;
        binding.set_terms_of_service_agreed(agree_to_terms_of_service);
        let account = binding.acme_account(staging)?;

        debug!(
            account = %account.name,
            directory = %account.directory_url,
            staging,
            "Creating account"
        );
        let created = self.client.create_account(&account, staging).await?;
        if !created {
            warn!(account = %account.name, staging, "Account already registered");
            return Err(OperationError::DuplicateAccount {
                account: account.name,
            });
        }

        binding.transition(AccountStatus::Registered);
        info!(account = %account.name, staging, "Account created");
        Ok(())
    }

    /// Push the account's contact URLs, and the terms-of-service agreement
    /// when `agree_to_terms_of_service` is given.
    pub async fn update_account(
        &self,
        context: &OperationContext,
        agree_to_terms_of_service: Option<bool>,
        staging: bool,
    ) -> Result<(), OperationError> {
        let binding = self.binding(context)?;
        let account = binding.acme_account(staging)?;

        match agree_to_terms_of_service {
            Some(agreed) => {
                self.client
                    .update_account_terms(&account, staging, agreed, binding.contact_urls())
                    .await?;
                binding.set_terms_of_service_agreed(agreed);
            }
            None => {
                self.client
                    .update_account_contacts(&account, staging, binding.contact_urls())
                    .await?;
            }
        }

        info!(
            account = %account.name,
            staging,
            terms_of_service_agreed = ?agree_to_terms_of_service,
            "Account updated"
        );
        Ok(())
    }

    /// Roll the account over to a new key.
    ///
    /// The new key replaces the entry at the account's alias only after the
    /// certificate authority has accepted it.
    pub async fn change_account_key(
        &self,
        context: &OperationContext,
        staging: bool,
    ) -> Result<(), OperationError> {
        let binding = self.binding(context)?;
        let account = binding.acme_account(staging)?;
        let previous = account.key.fingerprint();

        let key = self.client.change_account_key(&account, staging).await?;
        let current = key.fingerprint();
        binding.enroll_key(key)?;
        binding.transition(AccountStatus::KeyRotated);

        info!(
            account = %account.name,
            staging,
            previous = ?previous,
            current = ?current,
            "Account key changed"
        );
        Ok(())
    }

    /// Deactivate the account at the certificate authority
    pub async fn deactivate_account(
        &self,
        context: &OperationContext,
        staging: bool,
    ) -> Result<(), OperationError> {
        let binding = self.binding(context)?;
        let account = binding.acme_account(staging)?;

        self.client.deactivate_account(&account, staging).await?;
        binding.transition(AccountStatus::Deactivated);

        info!(account = %account.name, staging, "Account deactivated");
        Ok(())
    }

    /// Directory metadata of the account's certificate authority
    pub async fn get_metadata(
        &self,
        context: &OperationContext,
        staging: bool,
    ) -> Result<AcmeMetadata, OperationError> {
        let binding = self.binding(context)?;
        let account = binding.acme_account(staging)?;

        let metadata = self
            .client
            .get_metadata(&account, staging)
            .await?
            .unwrap_or_default();

        debug!(account = %account.name, staging, empty = metadata.is_empty(), "Read metadata");
        Ok(metadata)
    }

    /// Observed lifecycle state, resolving the account if needed
    pub fn status(&self, context: &OperationContext) -> Result<AccountStatus, OperationError> {
        Ok(self.binding(context)?.status())
    }
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager")
            .field("account", self.account.address())
            .finish_non_exhaustive()
    }
}
