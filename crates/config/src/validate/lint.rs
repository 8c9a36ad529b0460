//! Configuration linting for best practices
//!
//! Checks configuration for missing best practices and potential issues.

use super::{ValidationResult, ValidationWarning};
use crate::Config;

/// Lint configuration for best practices
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    // Check accounts for missing contact information
    for account in config.accounts.values() {
        if account.contact_urls.is_empty() {
            result.add_warning(ValidationWarning::new(format!(
                "Account '{}' has no contact URLs (the CA cannot send expiry or revocation notices)",
                account.name
            )));
        }

        for contact in &account.contact_urls {
            if !contact.starts_with("mailto:") {
                result.add_warning(ValidationWarning::new(format!(
                    "Account '{}' contact '{}' is not a mailto: URL (most CAs reject other schemes)",
                    account.name, contact
                )));
            }
        }
    }

    // Check certificate authorities for plaintext endpoints
    for ca in config.certificate_authorities.values() {
        let endpoints = std::iter::once(&ca.url).chain(ca.staging_url.as_ref());
        for url in endpoints {
            if url.starts_with("http://") {
                result.add_warning(ValidationWarning::new(format!(
                    "Certificate authority '{}' endpoint '{}' does not use https",
                    ca.name, url
                )));
            }
        }
    }

    // Without a key store password, keys lacking an entry password are written as plain PEM
    for key_store in config.key_stores.values() {
        if key_store.credential_reference.is_none() && !key_store.is_fileless() {
            result.add_warning(ValidationWarning::new(format!(
                "Key store '{}' has no credential reference (private keys without an entry password are written unencrypted and the file has no integrity check)",
                key_store.name
            )));
        }
    }

    result
}
