//! Configuration validation
//!
//! Structural checks produce [`ConfigError`]s and make a configuration
//! unusable; lint checks produce warnings only.

pub mod keystores;
pub mod lint;
pub mod network;
pub mod references;

use std::fmt;

use crate::error::ConfigError;
use crate::Config;

/// Category of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    CertificateAuthority,
    Endpoint,
    KeyStore,
    Account,
    Credential,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::CertificateAuthority => "certificate-authority",
            ErrorCategory::Endpoint => "endpoint",
            ErrorCategory::KeyStore => "key-store",
            ErrorCategory::Account => "account",
            ErrorCategory::Credential => "credential",
        };
        f.write_str(name)
    }
}

/// A validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl From<ConfigError> for ValidationError {
    fn from(err: ConfigError) -> Self {
        Self::new(err.category(), err.to_string())
    }
}

/// A validation warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Collected errors and warnings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Every structural error in `config`, in check order
pub fn check_config(config: &Config) -> Vec<ConfigError> {
    let mut errors = network::check_endpoints(config);
    errors.extend(references::check_references(config));
    errors.extend(keystores::check_key_stores(config));
    errors
}

/// Run structural checks and lints, collecting everything
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    for err in check_config(config) {
        result.add_error(err.into());
    }
    result.merge(lint::lint_config(config));
    result
}
