//! Configuration error types.

use thiserror::Error;

use crate::validate::ErrorCategory;

/// Structural configuration errors.
///
/// These are detected before any resource is started or any remote call is
/// made, and leave no side effects behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("certificate authority name '{name}' is reserved for the built-in default")]
    ReservedCertificateAuthorityName { name: String },

    #[error("certificate authority '{name}' is already defined")]
    DuplicateCertificateAuthority { name: String },

    #[error("certificate authority '{name}' is not defined")]
    UnknownCertificateAuthority { name: String },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("certificate authority '{certificate_authority}' has no staging URL")]
    NoStagingUrl { certificate_authority: String },

    #[error("key store '{key_store}' has no path, so a type is required")]
    MissingKeyStoreType { key_store: String },

    #[error("account '{account}' references undefined key store '{key_store}'")]
    UnknownKeyStore { account: String, key_store: String },

    #[error("account '{account}' has an empty alias")]
    EmptyAlias { account: String },

    #[error("credential reference to store '{store}' cannot be resolved: credential stores are not supported")]
    UnsupportedCredentialStore { store: String },

    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),
}

impl ConfigError {
    /// Validation category this error is reported under
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::ReservedCertificateAuthorityName { .. }
            | ConfigError::DuplicateCertificateAuthority { .. }
            | ConfigError::UnknownCertificateAuthority { .. }
            | ConfigError::NoStagingUrl { .. } => ErrorCategory::CertificateAuthority,
            ConfigError::InvalidUrl { .. } => ErrorCategory::Endpoint,
            ConfigError::MissingKeyStoreType { .. } => ErrorCategory::KeyStore,
            ConfigError::UnknownKeyStore { .. } | ConfigError::EmptyAlias { .. } => {
                ErrorCategory::Account
            }
            ConfigError::UnsupportedCredentialStore { .. }
            | ConfigError::CredentialUnavailable(_) => ErrorCategory::Credential,
        }
    }
}
