//! Certificate authority endpoint validation
//!
//! Validates that every configured ACME directory URL parses and uses a
//! supported scheme.

use crate::ca::CertificateAuthority;
use crate::error::ConfigError;
use crate::Config;

/// Check every certificate authority endpoint
pub fn check_endpoints(config: &Config) -> Vec<ConfigError> {
    config
        .certificate_authorities
        .values()
        .filter_map(|ca| CertificateAuthority::try_from(ca).err())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CertificateAuthorityConfig;

    fn config_with_ca(url: &str, staging_url: Option<&str>) -> Config {
        let mut config = Config::default();
        config.certificate_authorities.insert(
            "internal".to_string(),
            CertificateAuthorityConfig {
                name: "internal".to_string(),
                url: url.to_string(),
                staging_url: staging_url.map(str::to_string),
            },
        );
        config
    }

    #[test]
    fn test_valid_endpoints() {
        let config = config_with_ca(
            "https://acme.internal.example/directory",
            Some("https://staging.internal.example/directory"),
        );
        assert!(check_endpoints(&config).is_empty());
    }

    #[test]
    fn test_malformed_staging_endpoint() {
        let config = config_with_ca("https://acme.internal.example/directory", Some("nope"));
        let errors = check_endpoints(&config);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::InvalidUrl { ref url, .. } if url == "nope"));
    }
}
