//! Error types for management operations.

use thiserror::Error;

use keyward_common::ResolutionError;
use keyward_config::ConfigError;

use crate::acme::AcmeError;

/// Errors returned by management operations on security resources.
///
/// Configuration and resolution errors are raised before any remote call
/// and leave no side effects behind.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Structural configuration problem
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// Resource resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A resource the operation depends on is not available
    #[error("required resource is not available: {0}")]
    ProviderState(String),

    /// The certificate authority rejected or failed the request
    #[error("certificate authority request failed: {0}")]
    Protocol(#[from] AcmeError),

    /// The account is already registered with the certificate authority
    #[error(
        "account '{account}' is already registered with the certificate authority; \
         use update-account or change-account-key instead"
    )]
    DuplicateAccount { account: String },

    /// Key store access failed
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
}

/// Key store adapter errors.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("alias '{alias}' not found in key store '{key_store}'")]
    AliasNotFound { key_store: String, alias: String },

    #[error("alias '{alias}' does not hold a private key")]
    NotAPrivateKeyEntry { alias: String },

    #[error("wrong password for alias '{alias}'")]
    WrongPassword { alias: String },

    #[error("alias '{alias}' is sealed under the key store password, which is not configured")]
    KeyStorePasswordRequired { alias: String },

    #[error("private key encryption failed: {0}")]
    Encryption(String),

    #[error("integrity check failed for key store '{key_store}' (wrong password or tampered file)")]
    IntegrityCheckFailed { key_store: String },

    #[error("unsupported key store document version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid certificate: {0}")]
    Certificate(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
