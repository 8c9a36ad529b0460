//! ACME protocol client seam.

use async_trait::async_trait;
use url::Url;

use super::error::AcmeError;
use super::metadata::AcmeMetadata;
use crate::keystore::KeyMaterial;

/// Account as presented to the certificate authority for one request.
///
/// Built fresh for every operation, so `key` is always the key currently
/// stored for the account.
#[derive(Debug, Clone)]
pub struct AcmeAccount {
    pub name: String,
    /// Directory URL of the production or staging endpoint
    pub directory_url: Url,
    pub contact_urls: Vec<String>,
    pub terms_of_service_agreed: bool,
    pub key: KeyMaterial,
}

/// Remote ACME operations on an account.
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Register the account.
    ///
    /// Returns `false` if an account for this key already existed.
    async fn create_account(&self, account: &AcmeAccount, staging: bool) -> Result<bool, AcmeError>;

    /// Replace the account's contact URLs
    async fn update_account_contacts(
        &self,
        account: &AcmeAccount,
        staging: bool,
        contact_urls: &[String],
    ) -> Result<(), AcmeError>;

    /// Replace the contact URLs and set the terms-of-service agreement
    async fn update_account_terms(
        &self,
        account: &AcmeAccount,
        staging: bool,
        terms_of_service_agreed: bool,
        contact_urls: &[String],
    ) -> Result<(), AcmeError>;

    /// Roll the account over to a new key, returning the new key
    async fn change_account_key(
        &self,
        account: &AcmeAccount,
        staging: bool,
    ) -> Result<KeyMaterial, AcmeError>;

    async fn deactivate_account(&self, account: &AcmeAccount, staging: bool) -> Result<(), AcmeError>;

    /// Directory metadata, `None` when the directory has no `meta` object
    async fn get_metadata(
        &self,
        account: &AcmeAccount,
        staging: bool,
    ) -> Result<Option<AcmeMetadata>, AcmeError>;
}

/// Client for processes without an ACME transport.
///
/// Key store operations work as usual; every account operation fails with
/// [`AcmeError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineClient;

#[async_trait]
impl AcmeClient for OfflineClient {
    async fn create_account(&self, _account: &AcmeAccount, _staging: bool) -> Result<bool, AcmeError> {
        Err(AcmeError::Unavailable)
    }

    async fn update_account_contacts(
        &self,
        _account: &AcmeAccount,
        _staging: bool,
        _contact_urls: &[String],
    ) -> Result<(), AcmeError> {
        Err(AcmeError::Unavailable)
    }

    async fn update_account_terms(
        &self,
        _account: &AcmeAccount,
        _staging: bool,
        _terms_of_service_agreed: bool,
        _contact_urls: &[String],
    ) -> Result<(), AcmeError> {
        Err(AcmeError::Unavailable)
    }

    async fn change_account_key(
        &self,
        _account: &AcmeAccount,
        _staging: bool,
    ) -> Result<KeyMaterial, AcmeError> {
        Err(AcmeError::Unavailable)
    }

    async fn deactivate_account(&self, _account: &AcmeAccount, _staging: bool) -> Result<(), AcmeError> {
        Err(AcmeError::Unavailable)
    }

    async fn get_metadata(
        &self,
        _account: &AcmeAccount,
        _staging: bool,
    ) -> Result<Option<AcmeMetadata>, AcmeError> {
        Err(AcmeError::Unavailable)
    }
}
